//! The facade isolating the state holder from the concrete auth backend.

use crate::AuthResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use venered_types::{AuthSession, LoginCredentials, SignUpData};

/// Capacity of the change-stream broadcast channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// What kind of session change the backend is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First event after subscribing, carrying the backend's current view.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// A change to the backend-side session, pushed to subscribers.
///
/// The payload is authoritative: subscribers apply `session` verbatim,
/// whatever the kind says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChange {
    pub kind: ChangeKind,
    pub session: Option<AuthSession>,
}

/// Receiver half of a gateway change stream.
///
/// Dropping the receiver releases the subscription.
pub type SessionChanges = broadcast::Receiver<SessionChange>;

/// Uniform, error-normalized access to the remote auth backend.
///
/// Implementations: [`crate::SupabaseGateway`] for a real project,
/// [`crate::MockGateway`] for local development and tests.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Register a new account. Does NOT establish a session; callers sign
    /// in separately.
    async fn sign_up(&self, data: &SignUpData) -> AuthResult<()>;

    /// Exchange credentials for a session. The backend-side session is
    /// established and a `SignedIn` change is emitted; pushing the session
    /// into shared state is the caller's job.
    async fn sign_in(&self, credentials: &LoginCredentials) -> AuthResult<AuthSession>;

    /// Invalidate the backend-side session. Calling this while already
    /// signed out is a no-op, not an error.
    async fn sign_out(&self) -> AuthResult<()>;

    /// The backend's present view of the session.
    ///
    /// Never fails the caller: internal errors are logged and reported as
    /// absent, so restoring a session cannot wedge app start.
    async fn current_session(&self) -> Option<AuthSession>;

    /// Subscribe to session changes.
    ///
    /// An `InitialSession` event is delivered shortly after subscribing
    /// even if nothing has changed, so subscribers can resolve their
    /// unknown state without racing a separate fetch.
    fn subscribe(&self) -> SessionChanges;
}
