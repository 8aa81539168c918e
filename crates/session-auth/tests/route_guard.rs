mod common;

use backend_client::{AuthChange, AuthEvent, FakeBackend};
use common::Harness;
use session_auth::{
    GuardState, GuardView, RecordingNavigator, RouteGuard, SessionStore, StoreSnapshot,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn pending_guard_neither_renders_nor_redirects() {
    let backend = Arc::new(FakeBackend::new());
    let store = SessionStore::mount(backend.clone());
    let navigator = Arc::new(RecordingNavigator::new());

    let guard = RouteGuard::mount(&store, navigator.clone(), "/login");
    assert_eq!(guard.view(), GuardView::Placeholder);
    assert_eq!(guard.render(|| "secret dashboard"), None);

    // Notifications while loading do not resolve the guard.
    backend.notify(AuthChange::signed_out());
    assert_eq!(guard.state(), GuardState::Pending);
    assert!(navigator.routes().is_empty());

    store.initialize().await.unwrap();
    assert_eq!(guard.view(), GuardView::Redirecting);
    assert_eq!(navigator.routes(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn restored_session_renders_protected_content() {
    let backend = Arc::new(FakeBackend::new());
    let identity = backend.add_account("a@x.com", "pw123456", "Ann");
    backend.restore_session(&identity);
    let store = SessionStore::mount(backend.clone());
    store.initialize().await.unwrap();
    let navigator = Arc::new(RecordingNavigator::new());

    let guard = RouteGuard::mount(&store, navigator.clone(), "/login");

    assert_eq!(guard.render(|| "profile page"), Some("profile page"));
    assert_eq!(guard.redirect_count(), 0);
    assert!(navigator.routes().is_empty());
}

#[tokio::test]
async fn sign_out_notification_redirects_every_guard_in_the_same_turn() {
    let h = Harness::new().await;
    h.signed_in("a@x.com").await;

    let first_nav = Arc::new(RecordingNavigator::new());
    let second_nav = Arc::new(RecordingNavigator::new());
    let first = RouteGuard::mount(&h.store, first_nav.clone(), "/login");
    let second = RouteGuard::mount(&h.store, second_nav.clone(), "/login");
    assert_eq!(first.view(), GuardView::Protected);
    assert_eq!(second.view(), GuardView::Protected);

    h.backend.notify(AuthChange::signed_out());

    assert_eq!(first_nav.routes(), vec!["/login".to_string()]);
    assert_eq!(second_nav.routes(), vec!["/login".to_string()]);
    assert_eq!(first.render(|| ()), None);
    assert_eq!(second.render(|| ()), None);
}

#[tokio::test]
async fn guard_reevaluates_on_every_notification() {
    let h = Harness::new().await;
    let identity = h.backend.add_account("a@x.com", "pw123456", "Ann");
    let navigator = Arc::new(RecordingNavigator::new());
    let guard = RouteGuard::mount(&h.store, navigator.clone(), "/login");
    assert_eq!(guard.view(), GuardView::Redirecting);

    let session = h.backend.restore_session(&identity);
    h.backend
        .notify(AuthChange::new(AuthEvent::SignedIn, Some(session)));
    assert_eq!(guard.view(), GuardView::Protected);

    h.backend.notify(AuthChange::signed_out());
    h.backend.notify(AuthChange::signed_out());
    assert_eq!(guard.view(), GuardView::Redirecting);

    // One redirect on mount, one when the session went away again.
    assert_eq!(guard.redirect_count(), 2);
    assert_eq!(navigator.routes().len(), 2);
}

#[tokio::test]
async fn unmounted_guard_stops_listening() {
    let h = Harness::new().await;
    h.signed_in("a@x.com").await;
    let navigator = Arc::new(RecordingNavigator::new());

    let guard = RouteGuard::mount(&h.store, navigator.clone(), "/login");
    assert_eq!(h.store.listener_count(), 1);
    drop(guard);
    assert_eq!(h.store.listener_count(), 0);

    h.backend.notify(AuthChange::signed_out());
    assert!(navigator.routes().is_empty());
}

#[tokio::test]
async fn controller_sign_out_redirects_guard() {
    let h = Harness::new().await;
    h.signed_in("a@x.com").await;
    let guard_nav = Arc::new(RecordingNavigator::new());
    let guard = RouteGuard::mount(&h.store, guard_nav.clone(), "/login");

    h.controller.sign_out().await.unwrap();

    assert_eq!(guard.view(), GuardView::Redirecting);
    assert_eq!(guard_nav.routes(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn guard_ignores_snapshot_overtaken_by_a_nested_sign_out() {
    let h = Harness::new().await;
    let identity = h.backend.add_account("a@x.com", "pw123456", "Ann");

    // The first listener reacts to the sign-in by signing out again, so the
    // guard sees the signed-out snapshot before the signed-in one.
    let backend = h.backend.clone();
    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_listener = Arc::clone(&fired);
    let _kick_out = h.store.subscribe(Arc::new(move |snapshot: &StoreSnapshot| {
        if snapshot.is_signed_in() && !fired_in_listener.swap(true, Ordering::SeqCst) {
            backend.notify(AuthChange::signed_out());
        }
    }));
    let navigator = Arc::new(RecordingNavigator::new());
    let guard = RouteGuard::mount(&h.store, navigator.clone(), "/login");
    navigator.clear();

    let session = h.backend.restore_session(&identity);
    h.backend
        .notify(AuthChange::new(AuthEvent::SignedIn, Some(session)));

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(h.store.current_identity(), None);
    assert_eq!(guard.view(), GuardView::Redirecting);
    assert_eq!(guard.render(|| "protected"), None);
}
