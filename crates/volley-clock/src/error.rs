//! Clock error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Clock sync failed: {0}")]
    SyncFailed(String),

    #[error("Clock not synchronized with venue")]
    NotSynced,

    #[error("Invalid target instant: {0}")]
    InvalidTarget(String),
}

pub type ClockResult<T> = Result<T, ClockError>;
