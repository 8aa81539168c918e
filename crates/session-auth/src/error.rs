//! Authentication error types.

use crate::activity::AuthActivity;
use backend_client::{BackendError, UnknownRole};
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Input rejected before contacting the backend
    #[error("{0}")]
    Validation(String),

    /// The backend rejected the call or could not be reached
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A multi-step operation failed part way; the local session was cleared
    #[error("Inconsistent account state: {0}")]
    Inconsistent(#[source] BackendError),

    /// Role name outside admin, user and moderator
    #[error(transparent)]
    InvalidRole(#[from] UnknownRole),

    /// The operation needs a signed-in user
    #[error("Not signed in")]
    NotSignedIn,

    /// Another operation is still running
    #[error("Another operation is in progress: {0:?}")]
    OperationInProgress(AuthActivity),
}

impl AuthError {
    /// Text shown to the user in an error notice.
    ///
    /// Backend rejections are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(message) => message.clone(),
            AuthError::Backend(e) | AuthError::Inconsistent(e) => e.to_string(),
            AuthError::InvalidRole(e) => e.to_string(),
            AuthError::NotSignedIn => "You must be signed in to do that".to_string(),
            AuthError::OperationInProgress(_) => "Please wait for the current request to finish".to_string(),
        }
    }

    /// Returns true if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Backend(e) => e.is_transient(),
            AuthError::OperationInProgress(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
