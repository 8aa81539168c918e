//! Session-change callbacks and the handles that release them.

use crate::types::AuthChange;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Callback invoked for every session change.
pub type SessionChangeCallback = Arc<dyn Fn(&AuthChange) + Send + Sync>;

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Handle for a registered callback.
///
/// Releasing it (explicitly or by dropping) stops further invocations.
/// Releasing more than once has no effect.
pub struct Subscription {
    release: Option<Release>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, SessionChangeCallback)>,
}

/// Ordered set of session-change callbacks.
///
/// Callbacks run in registration order, outside the registry lock, so a
/// callback may register or release other callbacks.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: SessionChangeCallback) -> Subscription {
        let id = {
            let mut registry = self.inner.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.push((id, callback));
            id
        };

        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().callbacks.retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn emit(&self, change: &AuthChange) {
        let callbacks: Vec<SessionChangeCallback> = self
            .inner
            .lock()
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::debug!(event = %change.event, listeners = callbacks.len(), "Emitting session change");

        for callback in callbacks {
            callback(change);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> SessionChangeCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_change: &AuthChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_registered_callbacks() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _a = registry.register(counting(&count));
        let _b = registry.register(counting(&count));

        registry.emit(&AuthChange::signed_out());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut sub = registry.register(counting(&count));

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert!(registry.is_empty());

        registry.emit(&AuthChange::new(AuthEvent::SignedIn, None));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_releases() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _sub = registry.register(counting(&count));
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_release_after_registry_dropped() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut sub = registry.register(counting(&count));
        drop(registry);
        sub.unsubscribe();
    }

    #[test]
    fn test_callback_may_release_itself() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in_cb = Arc::clone(&slot);

        let sub = registry.register(Arc::new(move |_change: &AuthChange| {
            slot_in_cb.lock().take();
        }));
        *slot.lock() = Some(sub);

        registry.emit(&AuthChange::signed_out());
        assert!(registry.is_empty());
    }
}
