//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket connect / IO failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Server answered with an error frame
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    /// The background connection task is gone
    #[error("Client stopped")]
    Stopped,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(err))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
