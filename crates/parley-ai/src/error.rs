//! Error types for parley-ai

use thiserror::Error;

/// Result type alias using parley-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a completion stream or a model listing.
///
/// Cancellation is deliberately absent: an aborted stream simply ends.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed or the connection broke mid-stream
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Server answered without a response payload
    #[error("Response body is empty")]
    EmptyResponse,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Message used when an error body carries no `error.message`
    pub const UNKNOWN_API_ERROR: &'static str = "Unknown error";

    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Build an API error from a raw error body.
    ///
    /// OpenAI-compatible servers answer `{"error": {"message": "..."}}`; any
    /// other body shape falls back to a generic message.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| Self::UNKNOWN_API_ERROR.to_string());
        Self::api(status, message)
    }

    /// Whether the request never produced a usable response
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::EmptyResponse)
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(serde::Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}
