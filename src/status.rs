//! Process exit codes, aligned with curl's numbering

use crate::errors::CommandError;

/// Exit code carrier for `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub u8);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    /// Conventional code for SIGINT termination.
    pub const INTERRUPTED: ExitStatus = ExitStatus(130);

    pub fn from_error(error: &CommandError) -> ExitStatus {
        ExitStatus(error.error.curl_code())
    }
}

impl std::process::Termination for ExitStatus {
    fn report(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self.0)
    }
}
