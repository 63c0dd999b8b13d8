use thiserror::Error;

#[derive(Error, Debug)]
pub enum CastError {
    /// The response kind does not match the pending command. Fatal to that
    /// one call only.
    #[error("received invalid response for command {command}: {detail}")]
    ProtocolViolation { command: String, detail: String },
    /// The cast target explicitly reported a failure.
    #[error("command {command} failed: {message}")]
    Remote { command: String, message: String },
    /// Transport-level failure. Handled by reconnect-and-resend, never
    /// surfaced to pending callers.
    #[error("connection to {0} lost")]
    ConnectionLost(String),
    #[error("command channel disposed")]
    Disposed,
    #[error("invalid cast target url {0}")]
    InvalidUrl(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl CastError {
    pub fn protocol_violation(command: &str, detail: impl Into<String>) -> Self {
        CastError::ProtocolViolation {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    pub fn remote(command: &str, message: impl Into<String>) -> Self {
        CastError::Remote {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CastError>;
