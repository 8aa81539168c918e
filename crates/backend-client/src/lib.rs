//! Client side of the hosted backend (Supabase) used by The 411 site.
//!
//! This crate provides:
//! - The consumed contract, split by concern: [`AuthApi`], [`TableApi`], [`StorageApi`]
//! - Domain types shared by every consumer: [`Session`], [`Identity`], [`Role`]
//! - [`Subscription`], the RAII handle for session-change callbacks
//! - [`SupabaseClient`], the REST implementation with session persistence
//! - `FakeBackend`, an in-memory implementation for tests (feature
//!   `test-support`)

mod api;
mod error;
#[cfg(any(test, feature = "test-support"))]
mod fake;
mod query;
mod subscription;
mod supabase;
mod types;

pub use api::{AuthApi, StorageApi, TableApi, UploadOptions};
pub use error::{BackendError, BackendResult};
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBackend;
pub use query::{
    decode_rows, select_maybe_single, select_rows, select_single, Cardinality, Filter,
};
pub use subscription::{ListenerRegistry, SessionChangeCallback, Subscription};
pub use supabase::SupabaseClient;
pub use types::{
    AuthChange, AuthEvent, Identity, Role, Session, SignUpAttributes, UnknownRole, UserMetadata,
};
