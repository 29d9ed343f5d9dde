// novin/src/error.rs
//
// Error taxonomy surfaced to SDK callers.
//
// invalid_input and rate_limited are reported before any shared state is
// touched. Persistence failures never reach the caller — they are logged,
// counted by the health monitor, and swallowed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("SDK used before initialize()")]
    NotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rate limited")]
    RateLimited,

    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    /// Stable machine-readable code, used by the CLI and HTTP bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized      => "not_initialized",
            Self::InvalidInput(_)     => "invalid_input",
            Self::RateLimited         => "rate_limited",
            Self::ProcessingFailed(_) => "processing_failed",
            Self::Internal(_)         => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
