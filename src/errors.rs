//! Error types for recurl
//!
//! The interpreter surfaces a closed taxonomy mirroring curl's numeric exit
//! codes. Parse failures are deterministic and never retried; transport-phase
//! failures are retryable under the configured retry policy.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Reason a command string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseReason {
    /// Blank or whitespace-only input
    EmptyCommand,
    /// No URL found among the tokens (or a bare `curl`)
    MissingUrl,
    /// A syntactically invalid option token
    UnknownOption(String),
    /// Any other offending fragment
    Fragment(String),
}

impl std::fmt::Display for ParseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseReason::EmptyCommand => write!(f, "empty command"),
            ParseReason::MissingUrl => write!(f, "no URL specified"),
            ParseReason::UnknownOption(name) => write!(f, "unknown option: {}", name),
            ParseReason::Fragment(frag) => write!(f, "{}", frag),
        }
    }
}

/// Which timing bound was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// `--connect-timeout`: bounds the initial handshake only
    Connect,
    /// `--max-time`: bounds the entire call including redirect hops
    Total,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutPhase::Connect => write!(f, "connect"),
            TimeoutPhase::Total => write!(f, "total"),
        }
    }
}

/// Main error type for recurl
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed command: {reason}")]
    MalformedCommand { reason: ParseReason },

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("could not resolve host: {0}")]
    DnsResolutionFailed(String),

    #[error("failed to connect to {host} port {port}")]
    ConnectionFailed { host: String, port: u16 },

    #[error("TLS certificate verification failed: {0}")]
    TlsVerificationFailed(String),

    #[error("{phase} timeout after {:.1} seconds", .after.as_secs_f64())]
    Timeout { phase: TimeoutPhase, after: Duration },

    #[error("too many redirects (max {0})")]
    TooManyRedirects(u32),

    #[error("HTTP error {status}")]
    HttpStatusError { status: u16, body: String },

    #[error("failed writing {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("aborted")]
    Aborted,
}

impl Error {
    /// Shorthand for a malformed-command error carrying an offending fragment.
    pub fn malformed(fragment: impl Into<String>) -> Self {
        Error::MalformedCommand {
            reason: ParseReason::Fragment(fragment.into()),
        }
    }

    /// Whether the caller-configured retry policy may retry this error.
    ///
    /// Transport-phase failures and 5xx/429 responses are retryable; parse
    /// errors, TLS verification failures and 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::DnsResolutionFailed(_)
            | Error::ConnectionFailed { .. }
            | Error::Timeout { .. }
            | Error::Transfer(_) => true,
            Error::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// The curl exit code this error corresponds to.
    pub fn curl_code(&self) -> u8 {
        match self {
            Error::MalformedCommand { .. } => 3,
            Error::UnsupportedProtocol(_) => 1,
            Error::DnsResolutionFailed(_) => 6,
            Error::ConnectionFailed { .. } => 7,
            Error::Protocol(_) => 8,
            Error::HttpStatusError { .. } => 22,
            Error::WriteError { .. } => 23,
            Error::ReadError { .. } => 26,
            Error::Timeout { .. } => 28,
            Error::Aborted => 42,
            Error::TooManyRedirects(_) => 47,
            Error::Transfer(_) => 56,
            Error::TlsVerificationFailed(_) => 60,
        }
    }
}

/// An [`Error`] with the original command text attached for diagnosability.
///
/// This is what the public [`CurlInterpreter`](crate::CurlInterpreter)
/// surface returns; the command echo makes failures reproducible verbatim.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct CommandError {
    /// The command string exactly as the caller supplied it
    pub command: String,
    #[source]
    pub error: Error,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::DnsResolutionFailed("x".into()).is_retryable());
        assert!(Error::HttpStatusError { status: 503, body: String::new() }.is_retryable());
        assert!(Error::HttpStatusError { status: 429, body: String::new() }.is_retryable());
        assert!(!Error::HttpStatusError { status: 404, body: String::new() }.is_retryable());
        assert!(!Error::TlsVerificationFailed("bad cert".into()).is_retryable());
        assert!(!Error::MalformedCommand { reason: ParseReason::EmptyCommand }.is_retryable());
    }

    #[test]
    fn test_curl_codes() {
        assert_eq!(Error::MalformedCommand { reason: ParseReason::MissingUrl }.curl_code(), 3);
        assert_eq!(Error::DnsResolutionFailed("h".into()).curl_code(), 6);
        assert_eq!(Error::ConnectionFailed { host: "h".into(), port: 80 }.curl_code(), 7);
        assert_eq!(Error::TooManyRedirects(50).curl_code(), 47);
        assert_eq!(
            Error::Timeout { phase: TimeoutPhase::Total, after: Duration::from_secs(1) }.curl_code(),
            28
        );
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError {
            command: "curl https://example.test".into(),
            error: Error::TooManyRedirects(5),
        };
        assert_eq!(err.to_string(), "too many redirects (max 5)");
        assert_eq!(err.command, "curl https://example.test");
    }
}
