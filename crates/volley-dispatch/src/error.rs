//! Dispatch error types.

use thiserror::Error;
use volley_clock::ClockError;

/// Failures that stop one account before it reaches the flood loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Pre-warm failed: {0}")]
    PreWarm(String),

    #[error("Dispatcher task failed: {0}")]
    TaskFailed(String),
}

pub type BurstResult<T> = Result<T, DispatchError>;
