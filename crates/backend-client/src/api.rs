//! The backend contract, split by concern.

use crate::error::BackendResult;
use crate::query::Filter;
use crate::subscription::{SessionChangeCallback, Subscription};
use crate::types::{Session, SignUpAttributes};
use async_trait::async_trait;
use serde_json::Value;

/// Authentication and remote procedures.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// The current session, if any. May refresh an expired one.
    async fn get_current_session(&self) -> BackendResult<Option<Session>>;

    /// Register a callback for session changes.
    fn on_session_change(&self, callback: SessionChangeCallback) -> Subscription;

    /// Create an account. Whether a session results depends on the
    /// project's email-confirmation setting.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> BackendResult<()>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;

    async fn sign_out(&self) -> BackendResult<()>;

    /// Invoke a named database function with JSON arguments.
    async fn invoke_remote_procedure(&self, name: &str, args: Value) -> BackendResult<Value>;
}

/// Row access to relational tables with equality filters.
#[async_trait]
pub trait TableApi: Send + Sync {
    /// Rows of `relation` matching every filter. `columns` is a
    /// comma-separated projection, `*` for all columns.
    async fn select(
        &self,
        relation: &str,
        columns: &str,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>>;

    /// Insert one row (object) or many (array); returns the stored rows.
    async fn insert(&self, relation: &str, rows: Value) -> BackendResult<Vec<Value>>;

    /// Apply `patch` to matching rows; returns the updated rows.
    async fn update(
        &self,
        relation: &str,
        patch: Value,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>>;

    async fn delete(&self, relation: &str, filters: &[Filter]) -> BackendResult<()>;
}

/// Upload behavior for [`StorageApi::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing object at the same path.
    pub upsert: bool,
    pub content_type: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upsert: false,
            content_type: "application/octet-stream".to_string(),
        }
    }
}

impl UploadOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Object storage buckets.
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()>;

    /// Public URL of an object. Pure computation, no request is made.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
