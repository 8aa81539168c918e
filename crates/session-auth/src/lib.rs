//! Session state, account operations and route guarding for The 411 site.
//!
//! - [`SessionStore`]: the single owner of the current session, fed by one
//!   initial fetch and the backend's change notifications
//! - [`AuthController`]: sign-up, sign-in, sign-out, account deletion and
//!   role checks, with user notices and redirects
//! - [`RouteGuard`]: renders protected content or redirects to login

mod activity;
mod controller;
mod error;
mod guard;
mod notice;
#[cfg(any(test, feature = "test-support"))]
mod recording;
mod store;

pub use activity::AuthActivity;
pub use controller::{
    AuthController, AuthRoutes, ACCOUNT_DELETED, SIGN_IN_WELCOME, SIGN_OUT_DONE,
    SIGN_UP_CONFIRMATION,
};
pub use error::{AuthError, AuthResult};
pub use guard::{GuardState, GuardView, RouteGuard};
pub use notice::{Navigator, Notice, NoticeKind, Notifier};
#[cfg(any(test, feature = "test-support"))]
pub use recording::{RecordingNavigator, RecordingNotifier};
pub use store::{SessionStore, StoreListener, StoreSnapshot};
