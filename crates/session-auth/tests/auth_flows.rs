mod common;

use backend_client::{AuthChange, AuthEvent, BackendError, FakeBackend, Role};
use common::{GatedAuth, Harness};
use serde_json::json;
use session_auth::{
    AuthActivity, AuthError, Notice, NoticeKind, SessionStore, StoreSnapshot, ACCOUNT_DELETED,
    SIGN_IN_WELCOME, SIGN_OUT_DONE, SIGN_UP_CONFIRMATION,
};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
async fn sign_up_accepted_asks_for_confirmation() {
    let h = Harness::new().await;

    h.controller
        .sign_up("a@x.com", "pw123456", "Ann")
        .await
        .unwrap();

    assert_eq!(h.notifier.notices(), vec![Notice::success(SIGN_UP_CONFIRMATION)]);
    assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
    assert!(h.store.current_session().is_none());
    assert!(h.backend.has_account("a@x.com"));
}

#[tokio::test]
async fn sign_up_with_missing_field_never_reaches_backend() {
    let h = Harness::new().await;
    h.backend.clear_calls();

    let err = h.controller.sign_up("a@x.com", "pw123456", "  ").await.unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.notifier.last().unwrap().kind, NoticeKind::Error);
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn sign_up_rejection_is_shown_verbatim() {
    let h = Harness::new().await;
    h.backend.add_account("a@x.com", "pw123456", "Ann");

    let err = h
        .controller
        .sign_up("a@x.com", "pw123456", "Ann")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Backend(BackendError::Rejected { status: 422, .. })));
    assert_eq!(h.notifier.notices(), vec![Notice::error("User already registered")]);
    assert!(h.navigator.routes().is_empty());
    assert!(h.store.current_session().is_none());
}

#[tokio::test]
async fn sign_in_with_wrong_password_keeps_session_empty() {
    let h = Harness::new().await;
    h.backend.add_account("a@x.com", "pw123456", "Ann");

    let err = h.controller.sign_in("a@x.com", "wrongpw").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid login credentials");
    assert_eq!(h.notifier.notices(), vec![Notice::error("Invalid login credentials")]);
    assert!(h.navigator.routes().is_empty());
    assert!(h.store.current_session().is_none());
}

#[tokio::test]
async fn failed_sign_in_keeps_the_previous_session() {
    let h = Harness::new().await;
    let ann = h.signed_in("a@x.com").await;
    let before = h.store.current_session();
    h.backend.add_account("b@x.com", "pw123456", "Ben");

    let err = h.controller.sign_in("b@x.com", "wrongpw").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid login credentials");
    assert_eq!(h.store.current_session(), before);
    assert_eq!(h.store.current_identity(), Some(ann));
    assert_eq!(h.notifier.notices(), vec![Notice::error("Invalid login credentials")]);
    assert!(h.navigator.routes().is_empty());
    assert_eq!(h.controller.activity(), AuthActivity::Idle);
}

#[tokio::test]
async fn sign_in_updates_store_and_goes_home() {
    let h = Harness::new().await;
    let identity = h.backend.add_account("a@x.com", "pw123456", "Ann");

    h.controller.sign_in("a@x.com", "pw123456").await.unwrap();

    assert_eq!(h.store.current_identity(), Some(identity));
    assert_eq!(h.notifier.notices(), vec![Notice::success(SIGN_IN_WELCOME)]);
    assert_eq!(h.navigator.last().as_deref(), Some("/"));
}

#[tokio::test]
async fn identity_is_present_strictly_between_sign_in_and_sign_out() {
    let h = Harness::new().await;
    h.backend.add_account("a@x.com", "pw123456", "Ann");

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_in_listener = Arc::clone(&seen);
    let _handle = h.store.subscribe(Arc::new(move |snapshot: &StoreSnapshot| {
        seen_in_listener.lock().push(snapshot.identity().is_some());
    }));

    h.controller.sign_in("a@x.com", "pw123456").await.unwrap();
    assert!(h.store.current_identity().is_some());

    h.controller.sign_out().await.unwrap();
    assert!(h.store.current_identity().is_none());

    assert_eq!(*seen.lock(), vec![true, false]);
    assert_eq!(h.notifier.last(), Some(Notice::success(SIGN_OUT_DONE)));
    assert_eq!(h.navigator.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn sign_out_while_signed_out_is_a_no_op() {
    let h = Harness::new().await;
    h.backend.clear_calls();

    h.controller.sign_out().await.unwrap();
    h.controller.sign_out().await.unwrap();

    assert!(h.store.current_identity().is_none());
    assert!(h.backend.calls().is_empty());
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn sign_out_failure_still_clears_local_session() {
    let h = Harness::new().await;
    h.signed_in("a@x.com").await;
    h.backend.fail("sign_out", 503, "Service unavailable");

    let err = h.controller.sign_out().await.unwrap_err();

    assert!(err.is_transient());
    assert!(h.store.current_identity().is_none());
    assert_eq!(h.notifier.notices(), vec![Notice::error("Service unavailable")]);
    assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn delete_account_removes_everything() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;
    h.backend.seed_row("profiles", json!({ "id": identity.id, "full_name": "Test User" }));

    h.controller.delete_account().await.unwrap();

    assert!(h.backend.rows("profiles").is_empty());
    assert!(!h.backend.has_account("a@x.com"));
    assert!(h.store.current_identity().is_none());
    assert_eq!(h.notifier.notices(), vec![Notice::success(ACCOUNT_DELETED)]);
    assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
    assert_eq!(
        h.backend.calls(),
        vec!["delete:profiles", "rpc:delete_user", "sign_out"]
    );
}

#[tokio::test]
async fn delete_account_remote_failure_forces_sign_out() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;
    h.backend.seed_row("profiles", json!({ "id": identity.id }));
    h.backend
        .fail("rpc:delete_user", 500, "permission denied for function delete_user");

    let err = h.controller.delete_account().await.unwrap_err();

    assert!(matches!(err, AuthError::Inconsistent(_)));
    assert!(h.store.current_identity().is_none());
    assert!(h.backend.current_session().is_none());
    assert!(h.backend.rows("profiles").is_empty());
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::error("permission denied for function delete_user")]
    );
    assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn delete_account_remote_failure_with_failing_sign_out_still_clears() {
    let h = Harness::new().await;
    h.signed_in("a@x.com").await;
    h.backend.fail("rpc:delete_user", 500, "boom");
    h.backend.fail("sign_out", 500, "also boom");

    let err = h.controller.delete_account().await.unwrap_err();

    assert!(matches!(err, AuthError::Inconsistent(_)));
    assert!(h.store.current_identity().is_none());
    assert_eq!(h.navigator.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn delete_account_profile_failure_aborts() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;
    h.backend.fail("delete:profiles", 403, "permission denied for table profiles");

    let err = h.controller.delete_account().await.unwrap_err();

    assert!(matches!(err, AuthError::Backend(_)));
    assert_eq!(h.store.current_identity(), Some(identity));
    assert_eq!(h.backend.call_count("rpc:delete_user"), 0);
    assert!(h.navigator.routes().is_empty());
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::error("permission denied for table profiles")]
    );
}

#[tokio::test]
async fn delete_account_requires_session() {
    let h = Harness::new().await;
    h.backend.clear_calls();

    let err = h.controller.delete_account().await.unwrap_err();

    assert!(matches!(err, AuthError::NotSignedIn));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.notifier.last().unwrap().kind, NoticeKind::Error);
}

#[tokio::test]
async fn role_check_without_identity_skips_backend() {
    let h = Harness::new().await;
    h.backend.clear_calls();

    assert!(!h.controller.has_role(Role::Admin).await);
    assert_eq!(h.controller.role_membership(Role::User).await.unwrap(), false);
    assert_eq!(h.backend.call_count("rpc:has_role"), 0);
}

#[tokio::test]
async fn role_check_queries_every_time() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;

    assert!(!h.controller.has_role(Role::Moderator).await);
    h.backend.grant_role(&identity.id, Role::Moderator);
    assert!(h.controller.has_role(Role::Moderator).await);
    assert!(!h.controller.has_role(Role::Admin).await);

    assert_eq!(h.backend.call_count("rpc:has_role"), 3);
}

#[tokio::test]
async fn role_check_fails_closed() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;
    h.backend.grant_role(&identity.id, Role::Admin);
    h.backend.fail("rpc:has_role", 500, "boom");

    assert!(!h.controller.has_role(Role::Admin).await);
    assert!(matches!(
        h.controller.role_membership(Role::Admin).await,
        Err(AuthError::Backend(_))
    ));
    // Role checks are silent.
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn role_check_while_loading_still_asks() {
    let backend = Arc::new(FakeBackend::new());
    let store = SessionStore::mount(backend.clone());
    let h = Harness::assemble(backend.clone(), backend.clone(), store);

    assert!(h.store.is_loading());
    assert!(!h.controller.has_role(Role::Admin).await);
    assert_eq!(h.backend.call_count("rpc:has_role"), 1);
}

#[tokio::test]
async fn notification_during_initial_fetch_wins() {
    let backend = Arc::new(FakeBackend::new());
    let identity = backend.add_account("a@x.com", "pw123456", "Ann");
    backend.restore_session(&identity);

    let gate = Arc::new(Notify::new());
    let gated = Arc::new(GatedAuth {
        inner: backend.clone(),
        session_gate: Some(gate.clone()),
        sign_in_gate: None,
    });
    let store = SessionStore::mount(gated);

    let (result, ()) = tokio::join!(store.initialize(), async {
        backend.notify(AuthChange::signed_out());
        gate.notify_one();
    });

    result.unwrap();
    assert!(!store.is_loading());
    assert!(store.current_session().is_none());
}

#[tokio::test]
async fn second_operation_rejected_while_one_is_in_flight() {
    let backend = Arc::new(FakeBackend::new());
    backend.add_account("a@x.com", "pw123456", "Ann");
    let gate = Arc::new(Notify::new());
    let gated = Arc::new(GatedAuth {
        inner: backend.clone(),
        session_gate: None,
        sign_in_gate: Some(gate.clone()),
    });
    let store = SessionStore::mount(gated.clone());
    store.initialize().await.unwrap();
    let h = Harness::assemble(backend, gated, store);

    let (first, second) = tokio::join!(h.controller.sign_in("a@x.com", "pw123456"), async {
        assert_eq!(h.controller.activity(), AuthActivity::SigningIn);
        let second = h.controller.sign_up("b@x.com", "pw123456", "Bee").await;
        gate.notify_one();
        second
    });

    first.unwrap();
    assert!(matches!(
        second,
        Err(AuthError::OperationInProgress(AuthActivity::SigningIn))
    ));
    assert_eq!(h.controller.activity(), AuthActivity::Idle);
    assert!(!h.backend.has_account("b@x.com"));
}

#[tokio::test]
async fn token_refresh_notification_keeps_user_signed_in() {
    let h = Harness::new().await;
    let identity = h.signed_in("a@x.com").await;

    let refreshed = h.backend.restore_session(&identity);
    h.backend
        .notify(AuthChange::new(AuthEvent::TokenRefreshed, Some(refreshed.clone())));

    assert_eq!(h.store.current_session(), Some(refreshed));
}
