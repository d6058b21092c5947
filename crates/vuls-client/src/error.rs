//! Error types for dictionary client operations

use thiserror::Error;

/// Result type alias for dictionary client operations
pub type Result<T> = std::result::Result<T, DictClientError>;

/// Errors that can occur during dictionary client operations
#[derive(Error, Debug)]
pub enum DictClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl DictClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for DictClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::HttpError(err)
        }
    }
}
