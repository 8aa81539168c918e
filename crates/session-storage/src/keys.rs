//! Storage key constants.

/// Storage keys used by the site tools.
pub struct StorageKeys;

impl StorageKeys {
    /// Current auth session (JSON)
    pub const AUTH_SESSION: &'static str = "auth_session";
}
