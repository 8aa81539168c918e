//! Typed session persistence on top of a [`SecureStorage`] backend.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Persists the current session as a single JSON value.
pub struct SessionVault {
    storage: Box<dyn SecureStorage>,
}

impl SessionVault {
    /// Create a vault over the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Store the session, replacing any previous one
    pub fn save<T: Serialize>(&self, session: &T) -> StorageResult<()> {
        let json =
            serde_json::to_string(session).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::AUTH_SESSION, &json)
    }

    /// Load the stored session, if any
    pub fn load<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        match self.storage.get(StorageKeys::AUTH_SESSION)? {
            Some(json) => {
                let session =
                    serde_json::from_str(&json).map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Check if a session is stored
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::AUTH_SESSION)
    }

    /// Remove the stored session. Clearing an empty vault is not an error.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_SESSION)?;
        Ok(())
    }
}
