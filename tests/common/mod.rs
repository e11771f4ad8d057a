//! Common test utilities for recurl integration tests
//!
//! Tests drive the library surface (`CurlInterpreter`) against a wiremock
//! server, so every scenario exercises the full pipeline: tokenizer,
//! option resolver, executor, assembler.

#![allow(dead_code)]

use recurl::{CommandError, CurlInterpreter, ExecutionResult};

/// Interpret and execute a command string with a fresh interpreter.
pub async fn run(command: &str) -> Result<ExecutionResult, CommandError> {
    CurlInterpreter::new().execute(command).await
}

/// Like [`run`], but panics with context when the command fails.
pub async fn run_ok(command: &str) -> ExecutionResult {
    match run(command).await {
        Ok(result) => result,
        Err(err) => panic!("command failed: {command}: {err}"),
    }
}

/// An address nothing is listening on, for connection-failure tests.
pub fn unused_local_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("127.0.0.1:{}", addr.port())
}
