use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response other than a recovered 401
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The access token was rejected and could not be refreshed. The
    /// session has been cleared.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    #[error("Stored token cannot be sent as a header")]
    InvalidToken,

    #[error("{0}")]
    UploadRejected(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload aborted")]
    UploadAborted,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// Maximum length of an error message written to the log
const MAX_LOGGED_MESSAGE_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

impl ApiError {
    /// The `error` field of a JSON error body, verbatim, if there is one.
    pub fn server_message(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error)
    }

    /// Display text cut down for log output; the error itself keeps the
    /// full message.
    pub fn log_excerpt(&self) -> String {
        let message = self.to_string();
        if message.len() <= MAX_LOGGED_MESSAGE_LENGTH {
            return message;
        }
        let mut end = MAX_LOGGED_MESSAGE_LENGTH;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &message[..end], message.len())
    }

    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message =
            Self::server_message(body).unwrap_or_else(|| format!("HTTP Error: {}", status));
        ApiError::Http { status, message }
    }

    pub fn upload_rejected(status: u16, body: &[u8]) -> Self {
        let message = Self::server_message(body)
            .unwrap_or_else(|| format!("Upload failed with status {}", status));
        ApiError::UploadRejected(message)
    }

    /// HTTP status for errors that came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailed)
    }
}
