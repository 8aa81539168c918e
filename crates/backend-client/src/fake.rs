//! In-memory backend for tests.
//!
//! Implements every backend trait against local state: accounts, one
//! session, tables of JSON rows, storage objects and role grants. Calls are
//! recorded by key (`sign_in`, `rpc:delete_user`, `select:artists`,
//! `upload:avatars`, ...) and the same keys can be scripted to fail.

use crate::api::{AuthApi, StorageApi, TableApi, UploadOptions};
use crate::error::{BackendError, BackendResult};
use crate::query::Filter;
use crate::subscription::{ListenerRegistry, SessionChangeCallback, Subscription};
use crate::types::{AuthChange, AuthEvent, Identity, Role, Session, SignUpAttributes, UserMetadata};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

const FAKE_API_URL: &str = "https://fake.supabase.local";

struct Account {
    password: String,
    identity: Identity,
    confirmed: bool,
}

#[derive(Default)]
struct FakeState {
    accounts: BTreeMap<String, Account>,
    session: Option<Session>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), (Vec<u8>, String)>,
    roles: HashMap<String, HashSet<Role>>,
    failures: HashMap<String, (u16, String)>,
    calls: Vec<String>,
    auto_confirm: bool,
}

impl FakeState {
    fn record(&mut self, key: String) -> BackendResult<()> {
        self.calls.push(key.clone());
        match self.failures.get(&key) {
            Some((status, message)) => Err(BackendError::rejected(*status, message.clone())),
            None => Ok(()),
        }
    }

    fn new_session(identity: Identity) -> Session {
        Session {
            access_token: format!("access-{}", uuid::Uuid::new_v4().simple()),
            refresh_token: format!("refresh-{}", uuid::Uuid::new_v4().simple()),
            expires_at: Utc::now() + Duration::hours(1),
            user: identity,
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut projected = Map::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(value) = row.get(column) {
            projected.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    listeners: ListenerRegistry,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups yield a session immediately instead of awaiting confirmation.
    pub fn with_auto_confirm(self) -> Self {
        self.state.lock().auto_confirm = true;
        self
    }

    /// Register a confirmed account and return its identity.
    pub fn add_account(&self, email: &str, password: &str, full_name: &str) -> Identity {
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            metadata: UserMetadata {
                full_name: Some(full_name.to_string()),
                ..Default::default()
            },
        };
        self.state.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
                confirmed: true,
            },
        );
        identity
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.state.lock().accounts.contains_key(email)
    }

    pub fn confirm(&self, email: &str) {
        if let Some(account) = self.state.lock().accounts.get_mut(email) {
            account.confirmed = true;
        }
    }

    /// Start with `identity` already signed in, as if restored from storage.
    /// No notification is sent.
    pub fn restore_session(&self, identity: &Identity) -> Session {
        let session = FakeState::new_session(identity.clone());
        self.state.lock().session = Some(session.clone());
        session
    }

    /// Deliver a notification as if the backend raised it on its own
    /// (another tab signing out, a background refresh).
    pub fn notify(&self, change: AuthChange) {
        self.state.lock().session = change.session.clone();
        self.listeners.emit(&change);
    }

    pub fn grant_role(&self, user_id: &str, role: Role) {
        self.state
            .lock()
            .roles
            .entry(user_id.to_string())
            .or_default()
            .insert(role);
    }

    /// Make every later call with this key fail with `message`.
    pub fn fail(&self, key: &str, status: u16, message: &str) {
        self.state
            .lock()
            .failures
            .insert(key.to_string(), (status, message.to_string()));
    }

    pub fn recover(&self, key: &str) {
        self.state.lock().failures.remove(key);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == key).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn seed_row(&self, relation: &str, row: Value) {
        self.state
            .lock()
            .tables
            .entry(relation.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, relation: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(relation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state
            .lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn get_current_session(&self) -> BackendResult<Option<Session>> {
        let mut state = self.state.lock();
        state.record("get_session".to_string())?;
        Ok(state.session.clone())
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
        let signed_in = {
            let mut state = self.state.lock();
            state.record("sign_up".to_string())?;

            if state.accounts.contains_key(email) {
                return Err(BackendError::rejected(422, "User already registered"));
            }
            if password.len() < 6 {
                return Err(BackendError::rejected(
                    422,
                    "Password should be at least 6 characters.",
                ));
            }

            let identity = Identity {
                id: uuid::Uuid::new_v4().to_string(),
                email: Some(email.to_string()),
                metadata: UserMetadata {
                    full_name: Some(attributes.full_name.clone()),
                    ..Default::default()
                },
            };
            let confirmed = state.auto_confirm;
            state.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                    confirmed,
                },
            );

            if confirmed {
                let session = FakeState::new_session(identity);
                state.session = Some(session.clone());
                Some(session)
            } else {
                None
            }
        };

        if let Some(session) = signed_in {
            self.listeners
                .emit(&AuthChange::new(AuthEvent::SignedIn, Some(session)));
        }
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let session = {
            let mut state = self.state.lock();
            state.record("sign_in".to_string())?;

            let identity = match state.accounts.get(email) {
                Some(account) if account.password == password && account.confirmed => {
                    account.identity.clone()
                }
                Some(account) if account.password == password => {
                    return Err(BackendError::rejected(400, "Email not confirmed"));
                }
                _ => return Err(BackendError::rejected(400, "Invalid login credentials")),
            };

            let session = FakeState::new_session(identity);
            state.session = Some(session.clone());
            session
        };

        self.listeners
            .emit(&AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let had_session = {
            let mut state = self.state.lock();
            state.record("sign_out".to_string())?;
            state.session.take().is_some()
        };

        if had_session {
            self.listeners.emit(&AuthChange::signed_out());
        }
        Ok(())
    }

    async fn invoke_remote_procedure(&self, name: &str, args: Value) -> BackendResult<Value> {
        let mut state = self.state.lock();
        state.record(format!("rpc:{}", name))?;

        match name {
            "has_role" => {
                let user_id = args
                    .get("requested_user_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::rejected(400, "missing requested_user_id"))?;
                let role: Role = args
                    .get("requested_role")
                    .cloned()
                    .map(serde_json::from_value::<Role>)
                    .transpose()?
                    .ok_or_else(|| BackendError::rejected(400, "missing requested_role"))?;
                let held = state
                    .roles
                    .get(user_id)
                    .map(|roles| roles.contains(&role))
                    .unwrap_or(false);
                Ok(Value::Bool(held))
            }
            "delete_user" => {
                let user_id = state
                    .session
                    .as_ref()
                    .map(|s| s.user.id.clone())
                    .ok_or_else(|| BackendError::rejected(401, "JWT required"))?;
                state.accounts.retain(|_, account| account.identity.id != user_id);
                state.roles.remove(&user_id);
                Ok(Value::Null)
            }
            other => Err(BackendError::rejected(
                404,
                format!("Could not find the function public.{} in the schema cache", other),
            )),
        }
    }
}

#[async_trait]
impl TableApi for FakeBackend {
    async fn select(
        &self,
        relation: &str,
        columns: &str,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        let mut state = self.state.lock();
        state.record(format!("select:{}", relation))?;

        Ok(state
            .tables
            .get(relation)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, filters))
                    .map(|row| project(row, columns))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, relation: &str, rows: Value) -> BackendResult<Vec<Value>> {
        let mut state = self.state.lock();
        state.record(format!("insert:{}", relation))?;

        let rows = match rows {
            Value::Array(rows) => rows,
            row @ Value::Object(_) => vec![row],
            other => {
                return Err(BackendError::rejected(
                    400,
                    format!("cannot insert {}", other),
                ))
            }
        };

        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(object) = row.as_object_mut() {
                object
                    .entry("id")
                    .or_insert_with(|| json!(uuid::Uuid::new_v4().to_string()));
                object
                    .entry("created_at")
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
            }
            inserted.push(row);
        }

        state
            .tables
            .entry(relation.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(
        &self,
        relation: &str,
        patch: Value,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        let mut state = self.state.lock();
        state.record(format!("update:{}", relation))?;

        let Some(patch) = patch.as_object() else {
            return Err(BackendError::rejected(400, "update patch must be an object"));
        };

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(relation) {
            for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
                if let Some(object) = row.as_object_mut() {
                    for (key, value) in patch {
                        object.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, relation: &str, filters: &[Filter]) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.record(format!("delete:{}", relation))?;

        if let Some(rows) = state.tables.get_mut(relation) {
            rows.retain(|row| !matches_all(row, filters));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageApi for FakeBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.record(format!("upload:{}", bucket))?;

        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && state.objects.contains_key(&key) {
            return Err(BackendError::rejected(409, "The resource already exists"));
        }
        state.objects.insert(key, (bytes, options.content_type));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", FAKE_API_URL, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{select_single, Cardinality};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sign_in_requires_confirmed_account() {
        let backend = FakeBackend::new();
        backend
            .sign_up("new@the411.records", "secret1", &SignUpAttributes::default())
            .await
            .unwrap();
        assert!(backend.current_session().is_none());

        let err = backend
            .sign_in_with_password("new@the411.records", "secret1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email not confirmed");

        backend.confirm("new@the411.records");
        let session = backend
            .sign_in_with_password("new@the411.records", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user.email.as_deref(), Some("new@the411.records"));
    }

    #[tokio::test]
    async fn test_sign_in_emits_after_state_change() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_account("a@b.c", "pw1234", "A");

        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_in_cb = Arc::clone(&observed);
        let _sub = backend.on_session_change(Arc::new(move |change: &AuthChange| {
            observed_in_cb.lock().push(change.event);
        }));

        backend.sign_in_with_password("a@b.c", "pw1234").await.unwrap();
        backend.sign_out().await.unwrap();
        backend.sign_out().await.unwrap();

        assert_eq!(
            *observed.lock(),
            vec![AuthEvent::SignedIn, AuthEvent::SignedOut]
        );
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = FakeBackend::new();
        backend.fail("rpc:delete_user", 500, "boom");

        let err = backend
            .invoke_remote_procedure("delete_user", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(backend.call_count("rpc:delete_user"), 1);
    }

    #[tokio::test]
    async fn test_has_role_rpc() {
        let backend = FakeBackend::new();
        backend.grant_role("u1", Role::Admin);

        let held = backend
            .invoke_remote_procedure(
                "has_role",
                json!({ "requested_user_id": "u1", "requested_role": "admin" }),
            )
            .await
            .unwrap();
        assert_eq!(held, Value::Bool(true));

        let not_held = backend
            .invoke_remote_procedure(
                "has_role",
                json!({ "requested_user_id": "u1", "requested_role": "moderator" }),
            )
            .await
            .unwrap();
        assert_eq!(not_held, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_tables_filter_update_delete() {
        let backend = FakeBackend::new();
        let inserted = backend
            .insert("artists", json!({ "name": "Nova", "user_id": "u1" }))
            .await
            .unwrap();
        let id = inserted[0]["id"].as_str().unwrap().to_string();

        let updated = backend
            .update("artists", json!({ "genre": "soul" }), &[Filter::eq("id", id.as_str())])
            .await
            .unwrap();
        assert_eq!(updated[0]["genre"], "soul");

        let row: Value = select_single(&backend, "artists", &[Filter::eq("user_id", "u1")])
            .await
            .unwrap();
        assert_eq!(row["name"], "Nova");

        let names = backend
            .select("artists", "name", &[])
            .await
            .unwrap();
        assert_eq!(names, vec![json!({ "name": "Nova" })]);

        backend.delete("artists", &[Filter::eq("id", id)]).await.unwrap();
        let missing = select_single::<Value>(&backend, "artists", &[]).await.unwrap_err();
        assert!(matches!(
            missing,
            BackendError::RowCount {
                expected: Cardinality::ExactlyOne,
                actual: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_upload_respects_upsert() {
        let backend = FakeBackend::new();
        backend
            .upload("avatars", "u1/a.png", vec![1], UploadOptions::default())
            .await
            .unwrap();

        let err = backend
            .upload("avatars", "u1/a.png", vec![2], UploadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The resource already exists");

        backend
            .upload("avatars", "u1/a.png", vec![3], UploadOptions::default().upsert(true))
            .await
            .unwrap();
        assert_eq!(backend.object("avatars", "u1/a.png"), Some(vec![3]));
    }
}
