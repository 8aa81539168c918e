//! Supabase REST client: auth, PostgREST tables, RPC and storage.
//!
//! The current session is cached in memory and persisted through a
//! [`SessionVault`] so a later process starts signed in. Every change to
//! the session is announced to registered callbacks before the call that
//! caused it returns.

use crate::api::{AuthApi, StorageApi, TableApi, UploadOptions};
use crate::error::{BackendError, BackendResult};
use crate::query::Filter;
use crate::subscription::{ListenerRegistry, SessionChangeCallback, Subscription};
use crate::types::{AuthChange, AuthEvent, Identity, Session, SignUpAttributes};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use session_storage::SessionVault;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Pull the human-readable message out of an error body.
///
/// Auth endpoints use `msg` or `error_description`, PostgREST and storage
/// use `message` or `error`.
fn rejection(status: reqwest::StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {}", status));
    BackendError::rejected(status.as_u16(), message)
}

/// Token grant returned by sign-in, refresh and auto-confirmed sign-up.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Supabase client bound to one project.
pub struct SupabaseClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    vault: SessionVault,
    session: Mutex<Option<Session>>,
    listeners: ListenerRegistry,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    /// * `vault` - Where the session is persisted between runs
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>, vault: SessionVault) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            vault,
            session: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    fn rest_url(&self, relation: &str, columns: Option<&str>, filters: &[Filter]) -> BackendResult<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.api_url, relation))?;
        if columns.is_some() || !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            if let Some(columns) = columns {
                pairs.append_pair("select", columns);
            }
            for filter in filters {
                let (column, value) = filter.to_query_pair();
                pairs.append_pair(&column, &value);
            }
        }
        Ok(url)
    }

    fn storage_object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.api_url,
            bucket,
            path.trim_start_matches('/')
        )
    }

    /// Session from memory, falling back to the vault.
    fn stored_session(&self) -> Option<Session> {
        if let Some(session) = self.session.lock().clone() {
            return Some(session);
        }
        match self.vault.load::<Session>() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to load stored session");
                None
            }
        }
    }

    /// Bearer credential for data calls: the user's token when signed in.
    fn bearer(&self) -> String {
        let token = self
            .stored_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        format!("Bearer {}", token)
    }

    /// Make `session` current, persist it and announce `event`.
    fn adopt(&self, session: Session, event: AuthEvent) {
        if let Err(e) = self.vault.save(&session) {
            warn!(error = %e, "Failed to persist session, keeping it in memory only");
        }
        *self.session.lock() = Some(session.clone());
        info!(user_id = %session.user.id, event = %event, "Session updated");
        self.listeners.emit(&AuthChange::new(event, Some(session)));
    }

    /// Forget the session locally and announce the sign-out.
    fn clear_local(&self) {
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        *self.session.lock() = None;
        self.listeners.emit(&AuthChange::signed_out());
    }

    async fn check(response: reqwest::Response, context: &str) -> BackendResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        warn!(status = %status, body_summary = %body_summary, "{} failed", context);
        Err(rejection(status, &body))
    }

    async fn try_refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let url = self.auth_url("token?grant_type=refresh_token");
        debug!(url = %url, "Refreshing token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let response = Self::check(response, "Token refresh").await?;

        let data: TokenResponse = response.json().await?;
        Ok(data.into_session())
    }
}

#[async_trait]
impl AuthApi for SupabaseClient {
    async fn get_current_session(&self) -> BackendResult<Option<Session>> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        if !session.is_expired() {
            *self.session.lock() = Some(session.clone());
            return Ok(Some(session));
        }

        info!(user_id = %session.user.id, "Stored session expired, attempting refresh");
        match self.try_refresh(&session.refresh_token).await {
            Ok(fresh) => {
                self.adopt(fresh.clone(), AuthEvent::TokenRefreshed);
                Ok(Some(fresh))
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                warn!(error = %e, "Refresh rejected, clearing stored session");
                self.clear_local();
                Ok(None)
            }
        }
    }

    fn on_session_change(&self, callback: SessionChangeCallback) -> Subscription {
        self.listeners.register(callback)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> BackendResult<()> {
        let url = self.auth_url("signup");
        debug!(url = %url, email = %email, "Attempting sign-up");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": attributes,
            }))
            .send()
            .await?;
        let response = Self::check(response, "Sign-up").await?;

        // Projects without email confirmation answer with a token grant.
        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let data: TokenResponse = serde_json::from_value(body)?;
            self.adopt(data.into_session(), AuthEvent::SignedIn);
        } else {
            info!(email = %email, "Sign-up accepted, confirmation pending");
        }
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let url = self.auth_url("token?grant_type=password");
        debug!(url = %url, email = %email, "Attempting email/password sign-in");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        let response = Self::check(response, "Sign-in").await?;

        let data: TokenResponse = response.json().await?;
        let session = data.into_session();
        self.adopt(session.clone(), AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let Some(session) = self.stored_session() else {
            debug!("Sign-out without a session");
            return Ok(());
        };

        let outcome = match self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await
        {
            Ok(response) => Self::check(response, "Sign-out").await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        // Local state is cleared whatever the remote outcome.
        self.clear_local();
        match outcome {
            Ok(()) => Ok(()),
            // The server already forgot this session.
            Err(e) if e.is_session_invalid() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn invoke_remote_procedure(&self, name: &str, args: Value) -> BackendResult<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.api_url, name);
        debug!(function = %name, "Invoking remote procedure");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&args)
            .send()
            .await?;
        let response = Self::check(response, "Remote procedure").await?;

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TableApi for SupabaseClient {
    async fn select(
        &self,
        relation: &str,
        columns: &str,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        let url = self.rest_url(relation, Some(columns), filters)?;
        debug!(relation = %relation, filters = filters.len(), "Selecting rows");

        let response = self
            .http_client
            .get(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check(response, "Select").await?;

        let rows: Vec<Value> = response.json().await?;
        debug!(relation = %relation, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    async fn insert(&self, relation: &str, rows: Value) -> BackendResult<Vec<Value>> {
        let url = self.rest_url(relation, None, &[])?;
        debug!(relation = %relation, "Inserting rows");

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let response = Self::check(response, "Insert").await?;

        Ok(response.json().await?)
    }

    async fn update(
        &self,
        relation: &str,
        patch: Value,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        let url = self.rest_url(relation, None, filters)?;
        debug!(relation = %relation, filters = filters.len(), "Updating rows");

        let response = self
            .http_client
            .patch(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let response = Self::check(response, "Update").await?;

        Ok(response.json().await?)
    }

    async fn delete(&self, relation: &str, filters: &[Filter]) -> BackendResult<()> {
        let url = self.rest_url(relation, None, filters)?;
        debug!(relation = %relation, filters = filters.len(), "Deleting rows");

        let response = self
            .http_client
            .delete(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::check(response, "Delete").await?;
        Ok(())
    }
}

#[async_trait]
impl StorageApi for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()> {
        let url = self.storage_object_url(bucket, path);
        debug!(bucket = %bucket, path = %path, size = bytes.len(), upsert = options.upsert, "Uploading object");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .header("Content-Type", options.content_type.as_str())
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;
        Self::check(response, "Upload").await?;

        info!(bucket = %bucket, path = %path, "Object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.api_url,
            bucket,
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn client() -> SupabaseClient {
        SupabaseClient::new(
            "https://project.supabase.co/",
            "anon-key",
            SessionVault::new(Box::new(MemoryStorage::new())),
        )
    }

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: Identity {
                id: "user-1".to_string(),
                email: None,
                metadata: Default::default(),
            },
        }
    }

    #[test]
    fn test_summarize_response_body_hides_content() {
        let summary = summarize_response_body("secret token");
        assert!(summary.starts_with("len=12,digest="));
        assert!(!summary.contains("secret"));
    }

    #[test]
    fn test_rejection_message_extraction() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let auth = rejection(status, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(auth.to_string(), "Invalid login credentials");

        let gotrue = rejection(status, r#"{"code":422,"msg":"User already registered"}"#);
        assert_eq!(gotrue.to_string(), "User already registered");

        let rest = rejection(status, r#"{"message":"permission denied for table profiles"}"#);
        assert_eq!(rest.to_string(), "permission denied for table profiles");

        let opaque = rejection(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(opaque.to_string(), "HTTP 502 Bad Gateway");
        assert!(opaque.is_transient());
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(client.api_url(), "https://project.supabase.co");

        let url = client
            .rest_url("artists", Some("*"), &[Filter::eq("user_id", "u 1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/rest/v1/artists?select=*&user_id=eq.u+1"
        );

        let bare = client.rest_url("team_members", None, &[]).unwrap();
        assert_eq!(bare.as_str(), "https://project.supabase.co/rest/v1/team_members");

        assert_eq!(
            client.public_url("avatars", "u1/abc.png"),
            "https://project.supabase.co/storage/v1/object/public/avatars/u1/abc.png"
        );
        assert_eq!(
            client.storage_object_url("team-members", "/m1.jpg"),
            "https://project.supabase.co/storage/v1/object/team-members/m1.jpg"
        );
    }

    #[test]
    fn test_token_response_prefers_absolute_expiry() {
        let data: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 2_000_000_000,
            "token_type": "bearer",
            "user": { "id": "u1", "email": "a@b.c" }
        }))
        .unwrap();
        let session = data.into_session();
        assert_eq!(session.expires_at.timestamp(), 2_000_000_000);
        assert_eq!(session.user.id, "u1");
    }

    #[tokio::test]
    async fn test_current_session_from_vault() {
        let vault = SessionVault::new(Box::new(MemoryStorage::new()));
        vault.save(&session(Utc::now() + Duration::hours(1))).unwrap();
        let client = SupabaseClient::new("https://project.supabase.co", "anon", vault);

        let current = client.get_current_session().await.unwrap().unwrap();
        assert_eq!(current.user_id(), "user-1");
        assert_eq!(client.bearer(), "Bearer access");
    }

    #[tokio::test]
    async fn test_no_session_uses_anon_key() {
        let client = client();
        assert!(client.get_current_session().await.unwrap().is_none());
        assert_eq!(client.bearer(), "Bearer anon-key");
        client.sign_out().await.unwrap();
    }

    #[test]
    fn test_adopt_and_clear_notify_listeners() {
        let client = client();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let _sub = client.on_session_change(Arc::new(move |_change: &AuthChange| {
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        }));

        client.adopt(session(Utc::now() + Duration::hours(1)), AuthEvent::SignedIn);
        assert!(client.vault.has_session().unwrap());

        client.clear_local();
        assert!(!client.vault.has_session().unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
