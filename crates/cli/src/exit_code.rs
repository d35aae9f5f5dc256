//! Process exit codes
//!
//! Scripts depend on these values; changing one is a breaking change.

use filer_core::Error;

/// Exit status of a filer invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,

    /// Anything without a more specific code
    GeneralError,

    /// Bad arguments, malformed or unknown URI, bad configuration, or a
    /// destination inside its source
    UsageError,

    /// Network failure, or a backend that failed to connect or disconnect
    NetworkError,

    AuthError,

    NotFound,

    /// Target already exists, or a directory is not empty
    Conflict,
}

impl ExitCode {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::GeneralError => 1,
            Self::UsageError => 2,
            Self::NetworkError => 3,
            Self::AuthError => 4,
            Self::NotFound => 5,
            Self::Conflict => 6,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.exit_code() {
            2 => Self::UsageError,
            3 => Self::NetworkError,
            4 => Self::AuthError,
            5 => Self::NotFound,
            6 => Self::Conflict,
            _ => Self::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.code())
    }
}
