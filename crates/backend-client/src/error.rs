//! Backend error types.

use crate::query::Cardinality;
use thiserror::Error;

/// Error type for calls against the hosted backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend answered a well-formed request with an error.
    /// `message` is the backend's own text and is shown to users verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Session persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] session_storage::StorageError),

    /// A row query returned a different number of rows than required
    #[error("Expected {expected} row(s), got {actual}")]
    RowCount { expected: Cardinality, actual: usize },

    /// The call needs a signed-in user
    #[error("Not signed in")]
    NotSignedIn,

    /// The backend answered with something this client cannot interpret
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl BackendError {
    /// Build a rejection from a status code and message.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and the operation could succeed later.
    ///
    /// Transient errors are connection failures, timeouts and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            BackendError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the backend says the caller's session is no longer valid.
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            BackendError::Rejected {
                status: 401 | 403 | 404,
                ..
            }
        )
    }
}

/// Result type alias using BackendError.
pub type BackendResult<T> = Result<T, BackendError>;
