//! Error types for volley-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid order intent: {0}")]
    InvalidIntent(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Invalid dispatch window: {0}")]
    InvalidWindow(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
