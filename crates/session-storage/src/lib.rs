//! Key/value persistence for the client-side session.
//!
//! This crate provides:
//! - [`SecureStorage`], the key/value backend trait
//! - [`MemoryStorage`] for tests and ephemeral processes
//! - [`FileStorage`], a JSON file with owner-only permissions on unix
//! - [`SessionVault`], the typed API the backend client persists sessions through

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
pub use vault::SessionVault;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Stored value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
