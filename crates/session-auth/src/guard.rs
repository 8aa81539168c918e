//! Route guard for protected views.
//!
//! ```text
//!              ┌─────────┐
//!              │ Pending │ (initial, store loading)
//!              └────┬────┘
//!    IdentityPresent│IdentityAbsent
//!          ┌────────┴────────┐
//!          ▼                 ▼
//!  ┌───────────────┐  ┌─────────────────┐
//!  │ Authenticated │◄►│ Unauthenticated │ ──► redirect to login on entry
//!  └───────────────┘  └─────────────────┘
//! ```
//!
//! There is no way back to `Pending`. While the store is loading no input
//! is fed, so the guard neither renders nor redirects.

use crate::notice::Navigator;
use crate::store::{SessionStore, StoreSnapshot};
use backend_client::Subscription;
use parking_lot::Mutex;
use rust_fsm::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub guard_machine(Pending)

    Pending => {
        IdentityPresent => Authenticated,
        IdentityAbsent => Unauthenticated
    },
    Authenticated => {
        IdentityPresent => Authenticated,
        IdentityAbsent => Unauthenticated
    },
    Unauthenticated => {
        IdentityPresent => Authenticated,
        IdentityAbsent => Unauthenticated
    }
}

pub use guard_machine::Input as GuardInput;
pub use guard_machine::State as GuardState;
pub use guard_machine::StateMachine as GuardMachine;

/// What a guarded view should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    /// Store still loading: render a placeholder only.
    Placeholder,
    /// Signed in: render the protected content.
    Protected,
    /// Signed out: the redirect has been issued, render nothing.
    Redirecting,
}

struct Evaluation {
    machine: GuardMachine,
    /// Revision of the newest snapshot evaluated so far.
    seen: Option<u64>,
}

struct GuardInner {
    evaluation: Mutex<Evaluation>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    redirects: AtomicUsize,
}

impl GuardInner {
    fn evaluate(&self, snapshot: &StoreSnapshot) {
        let input = if snapshot.identity().is_some() {
            GuardInput::IdentityPresent
        } else {
            GuardInput::IdentityAbsent
        };

        let entered_unauthenticated = {
            let mut evaluation = self.evaluation.lock();
            if evaluation.seen.is_some_and(|seen| snapshot.revision < seen) {
                debug!(
                    revision = snapshot.revision,
                    "Route guard skipped a stale store snapshot"
                );
                return;
            }
            evaluation.seen = Some(snapshot.revision);
            if snapshot.loading {
                return;
            }

            let machine = &mut evaluation.machine;
            let before = machine.state().clone();
            if machine.consume(&input).is_err() {
                return;
            }
            let after = machine.state().clone();
            if before != after {
                debug!(from = ?before, to = ?after, "Route guard transition");
            }
            after == GuardState::Unauthenticated && before != GuardState::Unauthenticated
        };

        if entered_unauthenticated {
            self.redirects.fetch_add(1, Ordering::SeqCst);
            info!(route = %self.login_route, "No session, redirecting to login");
            self.navigator.navigate(&self.login_route);
        }
    }

    fn view(&self) -> GuardView {
        match self.evaluation.lock().machine.state() {
            GuardState::Pending => GuardView::Placeholder,
            GuardState::Authenticated => GuardView::Protected,
            GuardState::Unauthenticated => GuardView::Redirecting,
        }
    }
}

/// A mounted guard. Unmount by dropping it.
pub struct RouteGuard {
    inner: Arc<GuardInner>,
    _subscription: Subscription,
}

impl RouteGuard {
    /// Mount a guard on `store`, evaluating the current state immediately
    /// and again on every store change.
    pub fn mount(
        store: &SessionStore,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        let inner = Arc::new(GuardInner {
            evaluation: Mutex::new(Evaluation {
                machine: GuardMachine::new(),
                seen: None,
            }),
            navigator,
            login_route: login_route.into(),
            redirects: AtomicUsize::new(0),
        });

        let weak: Weak<GuardInner> = Arc::downgrade(&inner);
        let subscription = store.subscribe(Arc::new(move |snapshot: &StoreSnapshot| {
            if let Some(inner) = weak.upgrade() {
                inner.evaluate(snapshot);
            }
        }));
        inner.evaluate(&store.snapshot());

        Self {
            inner,
            _subscription: subscription,
        }
    }

    pub fn view(&self) -> GuardView {
        self.inner.view()
    }

    pub fn state(&self) -> GuardState {
        self.inner.evaluation.lock().machine.state().clone()
    }

    /// Produce the protected content only when signed in.
    pub fn render<T>(&self, content: impl FnOnce() -> T) -> Option<T> {
        match self.view() {
            GuardView::Protected => Some(content()),
            GuardView::Placeholder | GuardView::Redirecting => None,
        }
    }

    /// Redirects issued since mounting.
    pub fn redirect_count(&self) -> usize {
        self.inner.redirects.load(Ordering::SeqCst)
    }
}
