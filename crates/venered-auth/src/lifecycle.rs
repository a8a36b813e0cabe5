//! Session lifecycle state machine using rust-fsm.
//!
//! This module defines an explicit finite state machine for the session
//! lifecycle, replacing implicit state derivation from "is the session
//! field set".
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │     Unknown     │ (initial; loading)
//! └────────┬────────┘
//!          │ SessionResolved          SessionCleared / LoadingTimedOut
//!          ▼                                        │
//! ┌─────────────────┐   SessionCleared    ┌─────────▼─────────┐
//! │  Authenticated  │ ──────────────────► │  Unauthenticated  │
//! └─────────────────┘ ◄────────────────── └───────────────────┘
//!                       SessionResolved
//! ```
//!
//! `Unknown` is left exactly once and is not re-enterable: no input maps
//! back to it. `LoadingTimedOut` is only defined while `Unknown`, so a
//! late deadline tick after resolution is rejected by the machine.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro
// This generates a module `session_lifecycle` with:
// - session_lifecycle::State (enum)
// - session_lifecycle::Input (enum)
// - session_lifecycle::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_lifecycle(Unknown)

    Unknown => {
        SessionResolved => Authenticated,
        SessionCleared => Unauthenticated,
        LoadingTimedOut => Unauthenticated
    },
    Authenticated => {
        // A fresh session replaces the current one wholesale
        SessionResolved => Authenticated,
        SessionCleared => Unauthenticated
    },
    Unauthenticated => {
        SessionResolved => Authenticated,
        SessionCleared => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_lifecycle::Input as LifecycleInput;
pub use session_lifecycle::State as LifecycleMachineState;
pub use session_lifecycle::StateMachine as LifecycleMachine;

/// User-facing lifecycle state for snapshots and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Initial indeterminate state, before the first definitive session
    /// determination arrives.
    Unknown,
    /// A session is present.
    Authenticated,
    /// No session.
    Unauthenticated,
}

impl LifecycleState {
    /// Returns true if a session is present.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LifecycleState::Authenticated)
    }

    /// Returns true while the first session determination is still pending.
    pub fn is_loading(&self) -> bool {
        matches!(self, LifecycleState::Unknown)
    }
}

impl From<&LifecycleMachineState> for LifecycleState {
    fn from(state: &LifecycleMachineState) -> Self {
        match state {
            LifecycleMachineState::Unknown => LifecycleState::Unknown,
            LifecycleMachineState::Authenticated => LifecycleState::Authenticated,
            LifecycleMachineState::Unauthenticated => LifecycleState::Unauthenticated,
        }
    }
}
