//! Error types.
//!
//! Two layers:
//!
//! - [`DeconvError`]: typed library errors. A whole request fails with one of
//!   these (malformed trace, no candidates, invalid configuration).
//! - [`AppError`]: what the `deconv` binary reports, an exit code plus a message.
//!
//! Per-peak failures are *not* errors at this level; they travel inside
//! `FitOutcome::Failed` (see `domain::PeakFailure`).

use thiserror::Error;

/// Fatal errors for a single engine call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvError {
    #[error("trace is empty")]
    EmptyTrace,

    #[error("position/intensity length mismatch: {positions} positions vs {intensities} intensities")]
    LengthMismatch { positions: usize, intensities: usize },

    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    #[error("trace positions must be sorted ascending (position at index {index} is smaller than its predecessor)")]
    UnsortedPositions { index: usize },

    #[error("no peak candidates supplied")]
    NoCandidates,

    #[error("peak candidate {index} has a non-finite position")]
    NonFiniteCandidate { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeconvError {
    /// Exit code the binary uses for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeconvError::InvalidConfig(_) => 2,
            _ => 3,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<DeconvError> for AppError {
    fn from(err: DeconvError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
