//! Session lifecycle core for the Venered client.
//!
//! This crate provides:
//! - The `AuthGateway` facade over the remote auth backend, with a real
//!   Supabase implementation and an in-memory mock backend
//! - The `AuthProvider` state holder that owns the process-wide session
//!   and resolves the initial loading state against a deadline
//! - Explicit FSM-based lifecycle state management
//! - The `SessionStore` persistence contract

mod error;
mod gateway;
mod lifecycle;
mod mock;
mod provider;
mod store;
mod supabase;

pub use error::{AuthError, AuthResult};
pub use gateway::{AuthGateway, ChangeKind, SessionChange, SessionChanges};
pub use lifecycle::session_lifecycle;
pub use lifecycle::{LifecycleInput, LifecycleMachine, LifecycleMachineState, LifecycleState};
pub use mock::{MockGateway, MockLatency, DEMO_EMAIL, DEMO_PASSWORD};
pub use provider::{AuthProvider, AuthSnapshot, ProviderOptions};
pub use store::{MemorySessionStore, SessionStore};
pub use supabase::{RefreshConfig, SupabaseGateway};
