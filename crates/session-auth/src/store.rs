//! Process-wide session state with change notification.
//!
//! The store is the only writer of the current session. It is fed by two
//! sources: one initial fetch ([`SessionStore::initialize`]) and the
//! backend's session-change notifications, which it subscribes to when
//! mounted. A notification that lands while the initial fetch is in flight
//! is newer than the fetched value, so the fetched value is discarded.

use crate::error::{AuthError, AuthResult};
use backend_client::{AuthApi, AuthChange, Identity, Session, Subscription};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Point-in-time view of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub session: Option<Session>,
    /// The initial fetch has not resolved yet.
    pub loading: bool,
    /// Increases with every change to the store. Listeners can run
    /// re-entrantly, so a snapshot may arrive after a newer one; compare
    /// revisions to discard it.
    pub revision: u64,
}

impl StoreSnapshot {
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Callback for store changes.
pub type StoreListener = Arc<dyn Fn(&StoreSnapshot) + Send + Sync>;

struct StoreState {
    session: Option<Session>,
    loading: bool,
    /// Bumped on every notification; lets the initial fetch detect that it
    /// has been overtaken.
    generation: u64,
    /// Bumped on every change of `session` or `loading`.
    revision: u64,
    torn_down: bool,
}

struct StoreInner {
    auth: Arc<dyn AuthApi>,
    state: RwLock<StoreState>,
    listeners: Mutex<Vec<(u64, StoreListener)>>,
    next_listener_id: Mutex<u64>,
    backend_subscription: Mutex<Option<Subscription>>,
}

impl StoreInner {
    fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            session: state.session.clone(),
            loading: state.loading,
            revision: state.revision,
        }
    }

    fn apply_change(&self, change: &AuthChange) {
        {
            let mut state = self.state.write();
            if state.torn_down {
                return;
            }
            state.session = change.session.clone();
            state.generation += 1;
            state.revision += 1;
        }
        debug!(
            event = %change.event,
            signed_in = change.session.is_some(),
            "Session change applied"
        );
        self.notify_listeners();
    }

    /// Listeners run outside every store lock, in subscription order.
    fn notify_listeners(&self) {
        let snapshot = self.snapshot();
        let listeners: Vec<StoreListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Shared handle to the session store. Clones refer to the same store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Create the store and subscribe to backend session changes.
    ///
    /// The store starts out loading; call [`initialize`](Self::initialize)
    /// (or [`spawn_initialize`](Self::spawn_initialize)) to resolve it.
    pub fn mount(auth: Arc<dyn AuthApi>) -> Self {
        let inner = Arc::new(StoreInner {
            auth: Arc::clone(&auth),
            state: RwLock::new(StoreState {
                session: None,
                loading: true,
                generation: 0,
                revision: 0,
                torn_down: false,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: Mutex::new(0),
            backend_subscription: Mutex::new(None),
        });

        let weak: Weak<StoreInner> = Arc::downgrade(&inner);
        let subscription = auth.on_session_change(Arc::new(move |change: &AuthChange| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_change(change);
            }
        }));
        *inner.backend_subscription.lock() = Some(subscription);

        debug!("Session store mounted");
        Self { inner }
    }

    /// Fetch any pre-existing session once and leave the loading state.
    ///
    /// Loading ends even when the fetch fails; the error is returned after
    /// listeners have seen the resolved store.
    pub async fn initialize(&self) -> AuthResult<()> {
        let generation = self.inner.state.read().generation;
        let fetched = self.inner.auth.get_current_session().await;

        {
            let mut state = self.inner.state.write();
            if state.torn_down {
                return Ok(());
            }
            match &fetched {
                Ok(session) if state.generation == generation => {
                    state.session = session.clone();
                }
                Ok(_) => {
                    debug!("Initial session fetch overtaken by a notification, keeping the newer state");
                }
                Err(e) => {
                    warn!(error = %e, "Initial session fetch failed");
                }
            }
            state.loading = false;
            state.revision += 1;
        }

        let snapshot = self.inner.snapshot();
        info!(
            signed_in = snapshot.is_signed_in(),
            user_id = snapshot.identity().map(|i| i.id.as_str()).unwrap_or(""),
            "Session store initialized"
        );
        self.inner.notify_listeners();

        fetched.map(|_| ()).map_err(AuthError::from)
    }

    /// Run [`initialize`](Self::initialize) on the tokio runtime.
    pub fn spawn_initialize(&self) -> tokio::task::JoinHandle<AuthResult<()>> {
        let store = self.clone();
        tokio::spawn(async move { store.initialize().await })
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.state.read().session.clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner
            .state
            .read()
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().loading
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    /// Register a listener for store changes. Dropping the handle removes it.
    pub fn subscribe(&self, listener: StoreListener) -> Subscription {
        let id = {
            let mut next = self.inner.next_listener_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        self.inner.listeners.lock().push((id, listener));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Whether the backend subscription is still held.
    pub fn is_mounted(&self) -> bool {
        self.inner.backend_subscription.lock().is_some()
    }

    /// Release the backend subscription and drop all listeners.
    /// Calling this again has no effect.
    pub fn teardown(&self) {
        let Some(mut subscription) = self.inner.backend_subscription.lock().take() else {
            debug!("Session store already torn down");
            return;
        };
        subscription.unsubscribe();
        self.inner.state.write().torn_down = true;
        self.inner.listeners.lock().clear();
        info!("Session store torn down");
    }

    /// Forget the session locally, announcing it like a sign-out
    /// notification. No-op when already signed out.
    pub(crate) fn clear_local(&self) {
        {
            let mut state = self.inner.state.write();
            if state.torn_down || state.session.is_none() {
                return;
            }
            state.session = None;
            state.generation += 1;
            state.revision += 1;
        }
        info!("Local session cleared");
        self.inner.notify_listeners();
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("snapshot", &self.snapshot())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
