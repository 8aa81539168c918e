//! Catalog error types.

use backend_client::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Input rejected before contacting the backend
    #[error("{0}")]
    Validation(String),

    /// The operation needs a signed-in user
    #[error("You must be logged in to {0}")]
    NotSignedIn(&'static str),

    /// The signed-in user does not own the record
    #[error("Only the owner can change this {0}")]
    NotOwner(&'static str),

    /// An insert was accepted but returned no rows
    #[error("No data returned from {0} creation")]
    EmptyInsert(&'static str),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CatalogError {
    /// Text shown to the user in an error notice.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
