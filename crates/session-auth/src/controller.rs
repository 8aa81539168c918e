//! Auth controller: account operations with their notices and redirects.
//!
//! Every operation catches its own failure, logs it, turns it into an error
//! notice and still returns it so callers can react. Notices are only
//! emitted once the backend has accepted or rejected the call. Nothing is
//! retried.

use crate::activity::{ActivityInput, ActivityMachine, AuthActivity};
use crate::error::{AuthError, AuthResult};
use crate::notice::{Navigator, Notice, Notifier};
use crate::store::SessionStore;
use backend_client::{AuthApi, BackendError, Filter, Role, SignUpAttributes, TableApi};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const SIGN_UP_CONFIRMATION: &str = "Check your email to confirm your account!";
pub const SIGN_IN_WELCOME: &str = "Welcome back!";
pub const SIGN_OUT_DONE: &str = "Signed out successfully";
pub const ACCOUNT_DELETED: &str = "Account deleted successfully";

const PROFILES_TABLE: &str = "profiles";
const DELETE_USER_PROCEDURE: &str = "delete_user";
const HAS_ROLE_PROCEDURE: &str = "has_role";

/// Where the controller sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRoutes {
    pub login: String,
    pub home: String,
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            home: "/".to_string(),
        }
    }
}

/// Resets the activity machine when an operation ends, however it ends.
struct ActivityGuard<'a> {
    machine: &'a Mutex<ActivityMachine>,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        let _ = self.machine.lock().consume(&ActivityInput::Finished);
    }
}

pub struct AuthController {
    store: SessionStore,
    auth: Arc<dyn AuthApi>,
    tables: Arc<dyn TableApi>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    routes: AuthRoutes,
    activity: Mutex<ActivityMachine>,
}

impl AuthController {
    pub fn new(
        store: SessionStore,
        auth: Arc<dyn AuthApi>,
        tables: Arc<dyn TableApi>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            auth,
            tables,
            navigator,
            notifier,
            routes: AuthRoutes::default(),
            activity: Mutex::new(ActivityMachine::new()),
        }
    }

    pub fn with_routes(mut self, routes: AuthRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn routes(&self) -> &AuthRoutes {
        &self.routes
    }

    /// The operation currently in flight.
    pub fn activity(&self) -> AuthActivity {
        AuthActivity::from(self.activity.lock().state())
    }

    fn begin(&self, input: ActivityInput) -> AuthResult<ActivityGuard<'_>> {
        let mut machine = self.activity.lock();
        let current = AuthActivity::from(machine.state());
        machine
            .consume(&input)
            .map_err(|_| AuthError::OperationInProgress(current))?;
        debug!(activity = ?AuthActivity::from(machine.state()), "Auth operation started");
        Ok(ActivityGuard {
            machine: &self.activity,
        })
    }

    /// Log a failure, show it to the user and hand it back.
    fn report(&self, operation: &str, err: AuthError) -> AuthError {
        warn!(operation = %operation, error = %err, "Auth operation failed");
        self.notifier.notify(Notice::error(err.user_message()));
        err
    }

    fn succeed(&self, message: &str, route: &str) {
        self.notifier.notify(Notice::success(message));
        self.navigator.navigate(route);
    }

    /// Create an account. The session stays empty until the address is
    /// confirmed and the user signs in.
    pub async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> AuthResult<()> {
        if email.trim().is_empty() || password.is_empty() || full_name.trim().is_empty() {
            let err = AuthError::Validation("Email, password and full name are required".to_string());
            return Err(self.report("sign_up", err));
        }
        let _activity = self
            .begin(ActivityInput::SignUp)
            .map_err(|e| self.report("sign_up", e))?;

        let attributes = SignUpAttributes {
            full_name: full_name.trim().to_string(),
        };
        match self.auth.sign_up(email.trim(), password, &attributes).await {
            Ok(()) => {
                info!(email = %email.trim(), "Sign-up accepted");
                self.succeed(SIGN_UP_CONFIRMATION, &self.routes.login);
                Ok(())
            }
            Err(e) => Err(self.report("sign_up", e.into())),
        }
    }

    /// Sign in with email and password. The store picks up the new session
    /// from the backend notification before this returns.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<()> {
        if email.trim().is_empty() || password.is_empty() {
            let err = AuthError::Validation("Email and password are required".to_string());
            return Err(self.report("sign_in", err));
        }
        let _activity = self
            .begin(ActivityInput::SignIn)
            .map_err(|e| self.report("sign_in", e))?;

        match self.auth.sign_in_with_password(email.trim(), password).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "Signed in");
                self.succeed(SIGN_IN_WELCOME, &self.routes.home);
                Ok(())
            }
            Err(e) => Err(self.report("sign_in", e.into())),
        }
    }

    /// Sign out. The local session is cleared even when the backend call
    /// fails. Signing out while already signed out does nothing.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let snapshot = self.store.snapshot();
        if !snapshot.loading && snapshot.session.is_none() {
            debug!("Sign-out requested while signed out");
            return Ok(());
        }
        let _activity = self
            .begin(ActivityInput::SignOut)
            .map_err(|e| self.report("sign_out", e))?;

        let result = self.auth.sign_out().await;
        self.store.clear_local();

        match result {
            Ok(()) => {
                info!("Signed out");
                self.succeed(SIGN_OUT_DONE, &self.routes.login);
                Ok(())
            }
            Err(e) => {
                let err = self.report("sign_out", e.into());
                self.navigator.navigate(&self.routes.login);
                Err(err)
            }
        }
    }

    /// Delete the signed-in user's profile row, then the account itself.
    ///
    /// If the profile row cannot be deleted nothing else happens. If the
    /// account deletion fails after the row is gone, the user is signed out
    /// locally and an [`AuthError::Inconsistent`] is returned.
    pub async fn delete_account(&self) -> AuthResult<()> {
        let Some(identity) = self.store.current_identity() else {
            return Err(self.report("delete_account", AuthError::NotSignedIn));
        };
        let _activity = self
            .begin(ActivityInput::DeleteAccount)
            .map_err(|e| self.report("delete_account", e))?;

        if let Err(e) = self
            .tables
            .delete(PROFILES_TABLE, &[Filter::eq("id", identity.id.as_str())])
            .await
        {
            return Err(self.report("delete_account", e.into()));
        }
        debug!(user_id = %identity.id, "Profile row deleted");

        match self
            .auth
            .invoke_remote_procedure(DELETE_USER_PROCEDURE, json!({}))
            .await
        {
            Ok(_) => {
                self.sign_out_best_effort().await;
                self.store.clear_local();
                info!(user_id = %identity.id, "Account deleted");
                self.succeed(ACCOUNT_DELETED, &self.routes.login);
                Ok(())
            }
            Err(e) => {
                error!(
                    user_id = %identity.id,
                    error = %e,
                    "Account deletion failed after the profile row was removed, forcing sign-out"
                );
                self.sign_out_best_effort().await;
                self.store.clear_local();
                let err = self.report("delete_account", AuthError::Inconsistent(e));
                self.navigator.navigate(&self.routes.login);
                Err(err)
            }
        }
    }

    /// Backend sign-out whose failure is only logged.
    async fn sign_out_best_effort(&self) {
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "Backend sign-out failed, continuing with local sign-out");
        }
    }

    /// Whether the signed-in user holds `role`, surfacing backend errors.
    ///
    /// A store that has resolved to signed-out answers `false` without
    /// asking the backend. Otherwise the backend is asked every time.
    pub async fn role_membership(&self, role: Role) -> AuthResult<bool> {
        let snapshot = self.store.snapshot();
        let user_id = match snapshot.identity() {
            Some(identity) => Some(identity.id.clone()),
            None if !snapshot.loading => {
                debug!(role = %role, "Role check without identity");
                return Ok(false);
            }
            None => None,
        };

        let value = self
            .auth
            .invoke_remote_procedure(
                HAS_ROLE_PROCEDURE,
                json!({
                    "requested_user_id": user_id,
                    "requested_role": role,
                }),
            )
            .await?;

        match value {
            Value::Bool(held) => Ok(held),
            Value::Null => Ok(false),
            other => Err(BackendError::UnexpectedResponse(format!(
                "{} returned {}",
                HAS_ROLE_PROCEDURE, other
            ))
            .into()),
        }
    }

    /// Fail-closed role check: any error counts as not holding the role.
    pub async fn has_role(&self, role: Role) -> bool {
        match self.role_membership(role).await {
            Ok(held) => held,
            Err(e) => {
                warn!(role = %role, error = %e, "Role check failed, treating as not held");
                false
            }
        }
    }
}
