#![allow(dead_code)]

use async_trait::async_trait;
use backend_client::{
    AuthApi, BackendResult, FakeBackend, Session, SessionChangeCallback, SignUpAttributes,
    Subscription,
};
use serde_json::Value;
use session_auth::{AuthController, RecordingNavigator, RecordingNotifier, SessionStore};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: SessionStore,
    pub controller: AuthController,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    /// Store mounted and initialized against an empty fake backend.
    pub async fn new() -> Self {
        Self::with_backend(Arc::new(FakeBackend::new())).await
    }

    pub async fn with_backend(backend: Arc<FakeBackend>) -> Self {
        let store = SessionStore::mount(backend.clone());
        store.initialize().await.unwrap();
        Self::assemble(backend.clone(), backend, store)
    }

    pub fn assemble(
        backend: Arc<FakeBackend>,
        auth: Arc<dyn AuthApi>,
        store: SessionStore,
    ) -> Self {
        let navigator = Arc::new(RecordingNavigator::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let controller = AuthController::new(
            store.clone(),
            auth,
            backend.clone(),
            navigator.clone(),
            notifier.clone(),
        );
        Self {
            backend,
            store,
            controller,
            navigator,
            notifier,
        }
    }

    /// Register a confirmed account and sign it in through the controller,
    /// then forget the resulting notice and navigation.
    pub async fn signed_in(&self, email: &str) -> backend_client::Identity {
        let identity = self.backend.add_account(email, "pw123456", "Test User");
        self.controller.sign_in(email, "pw123456").await.unwrap();
        self.notifier.clear();
        self.navigator.clear();
        self.backend.clear_calls();
        identity
    }
}

/// Auth wrapper whose session fetch and sign-in wait for a signal.
/// The session fetch reads its answer before waiting.
pub struct GatedAuth {
    pub inner: Arc<FakeBackend>,
    pub session_gate: Option<Arc<Notify>>,
    pub sign_in_gate: Option<Arc<Notify>>,
}

#[async_trait]
impl AuthApi for GatedAuth {
    async fn get_current_session(&self) -> BackendResult<Option<Session>> {
        // The answer is taken before waiting, like a response in flight.
        let fetched = self.inner.get_current_session().await;
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        fetched
    }

    fn on_session_change(&self, callback: SessionChangeCallback) -> Subscription {
        self.inner.on_session_change(callback)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> BackendResult<()> {
        self.inner.sign_up(email, password, attributes).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        if let Some(gate) = &self.sign_in_gate {
            gate.notified().await;
        }
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.inner.sign_out().await
    }

    async fn invoke_remote_procedure(&self, name: &str, args: Value) -> BackendResult<Value> {
        self.inner.invoke_remote_procedure(name, args).await
    }
}
