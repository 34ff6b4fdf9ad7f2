//! Client error types.

use thiserror::Error;
use volley_core::TransportError;

/// Venue client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Venue answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// No response (connect, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<ClientError> for TransportError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http { status, body } => TransportError::Http { status, body },
            ClientError::Transport(msg) => TransportError::Transport(msg),
            ClientError::Decode(msg) => TransportError::Decode(msg),
            ClientError::HttpClient(msg) | ClientError::Signing(msg) => {
                TransportError::Request(msg)
            }
        }
    }
}
