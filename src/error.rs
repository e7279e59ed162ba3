//! Error type shared by every request handler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered and told us what went wrong.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// The server's own message when it sent one, `fallback` for everything else.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ClientError::Api { message, .. } if !message.is_empty() => message.clone(),
            ClientError::Validation(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// HTTP-ish status used when rendering the error document.
    pub fn status(&self) -> u16 {
        match self {
            ClientError::Api { status, .. } => *status,
            ClientError::Validation(_) => 400,
            ClientError::Transport(_) => 502,
            ClientError::Decode(_) => 502,
            ClientError::Io(_) | ClientError::Config(_) => 500,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ClientError::Api { .. } => "API error",
            ClientError::Transport(_) => "Bad Gateway",
            ClientError::Decode(_) => "Unexpected response",
            ClientError::Validation(_) => "Invalid input",
            ClientError::Io(_) => "File error",
            ClientError::Config(_) => "Configuration error",
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}
