//! Operation-in-flight state machine for the auth controller.
//!
//! ```text
//!                 ┌──────────── Finished ─────────────┐
//!                 ▼                                   │
//!           ┌──────────┐  SignUp         ┌────────────┴────┐
//!           │   Idle   │ ──────────────► │ SigningUp       │
//!           └────┬─────┘  SignIn         │ SigningIn       │
//!                │ ────────────────────► │ SigningOut      │
//!                │  SignOut / DeleteAcct │ DeletingAccount │
//!                └─────────────────────► └─────────────────┘
//! ```
//!
//! Any input other than `Finished` outside `Idle` is impossible, which is
//! how a second operation started mid-flight gets rejected.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub activity_machine(Idle)

    Idle => {
        SignUp => SigningUp,
        SignIn => SigningIn,
        SignOut => SigningOut,
        DeleteAccount => DeletingAccount
    },
    SigningUp => {
        Finished => Idle
    },
    SigningIn => {
        Finished => Idle
    },
    SigningOut => {
        Finished => Idle
    },
    DeletingAccount => {
        Finished => Idle
    }
}

pub use activity_machine::Input as ActivityInput;
pub use activity_machine::State as ActivityMachineState;
pub use activity_machine::StateMachine as ActivityMachine;

/// What the controller is doing right now, for views that disable inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthActivity {
    Idle,
    SigningUp,
    SigningIn,
    SigningOut,
    DeletingAccount,
}

impl AuthActivity {
    pub fn is_busy(&self) -> bool {
        !matches!(self, AuthActivity::Idle)
    }
}

impl From<&ActivityMachineState> for AuthActivity {
    fn from(state: &ActivityMachineState) -> Self {
        match state {
            ActivityMachineState::Idle => AuthActivity::Idle,
            ActivityMachineState::SigningUp => AuthActivity::SigningUp,
            ActivityMachineState::SigningIn => AuthActivity::SigningIn,
            ActivityMachineState::SigningOut => AuthActivity::SigningOut,
            ActivityMachineState::DeletingAccount => AuthActivity::DeletingAccount,
        }
    }
}
