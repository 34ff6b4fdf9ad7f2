//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Core(#[from] volley_core::CoreError),

    #[error("Clock error: {0}")]
    Clock(#[from] volley_clock::ClockError),

    #[error("Venue client error: {0}")]
    Client(#[from] volley_client::ClientError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] volley_dispatch::DispatchError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] volley_telemetry::TelemetryError),

    #[error("Shutdown requested")]
    Shutdown,
}

pub type AppResult<T> = Result<T, AppError>;
