//! Execution results and timing data

use std::path::PathBuf;

use crate::config::Headers;

/// Phase timings in milliseconds.
///
/// A redirect chain produces one result for the final hop; `redirect_time`
/// accumulates across hops and `total` spans first dispatch to final
/// response fully read. Phases the transport cannot observe stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub dns_lookup: u64,
    pub connect: u64,
    pub tls_handshake: u64,
    pub pre_transfer: u64,
    pub start_transfer: u64,
    pub redirect_time: u64,
    pub total: u64,
}

/// The outcome of one interpreted curl command.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// HTTP status of the final hop
    pub status_code: u16,
    /// Response headers of the final hop (ordered, case-insensitive lookup)
    pub headers: Headers,
    /// Assembled text output: verbose trace, header blocks, textual payload
    /// and write-out rendering, in that order
    pub body: Option<String>,
    /// The payload when it could not be classified as text
    pub binary_data: Option<Vec<u8>>,
    pub timings: Timings,
    /// Files written by `-o` / `-O`
    pub output_files_written: Vec<PathBuf>,
    /// The original command text, echoed back for retry/debugging
    pub command_echo: String,
}

impl ExecutionResult {
    /// Whether the final status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
