//! Error types for cclip

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Clip not found: {0}")]
    NotFound(String),

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content sniffing failed: {0}")]
    Sniff(std::io::Error),

    #[error("Request body error: {0}")]
    Body(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClipError {
    /// HTTP status the gateway answers with for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClipError::NotFound(_) => StatusCode::NOT_FOUND,
            ClipError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ClipError::Unauthorized => StatusCode::UNAUTHORIZED,
            ClipError::Body(_) => StatusCode::BAD_REQUEST,
            ClipError::Io(_)
            | ClipError::Json(_)
            | ClipError::Sniff(_)
            | ClipError::Config(_)
            | ClipError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this is a filesystem/encoding failure rather than a caller mistake
    pub fn is_storage_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}
