//! recurl: execute curl command strings with curl-equivalent semantics.
//!
//! Hand [`CurlInterpreter::execute`] a command exactly as copied from
//! documentation, a terminal, or a browser's "copy as curl", and get back
//! the executed HTTP transaction: same option precedence, same redirect
//! behavior, same output-file conventions, same verbose formatting, same
//! numeric error codes.
//!
//! ```no_run
//! use recurl::CurlInterpreter;
//!
//! # async fn demo() -> Result<(), recurl::CommandError> {
//! let interpreter = CurlInterpreter::new();
//! let result = interpreter
//!     .execute(r#"curl -s -H "Accept: application/json" https://api.example.com/items"#)
//!     .await?;
//! println!("{} -> {:?}", result.status_code, result.body);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod config;
pub mod errors;
pub mod executor;
pub mod interpreter;
pub mod options;
pub mod response;
pub mod status;
pub mod tokenizer;

pub use config::{Body, Credentials, Headers, Method, RequestConfig};
pub use errors::{CommandError, Error, ParseReason, TimeoutPhase};
pub use executor::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use interpreter::CurlInterpreter;
pub use response::{ExecutionResult, Timings};
pub use status::ExitStatus;
