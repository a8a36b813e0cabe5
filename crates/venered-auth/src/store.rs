//! Session persistence contract.
//!
//! The core only states what it needs from persistence; where the session
//! actually lives (file, keychain, nothing) is the embedder's choice.

use crate::AuthResult;
use std::sync::Mutex;
use venered_types::AuthSession;

/// Contract for persisting the session across process restarts.
///
/// Gateways load from the store at construction and write through on every
/// session change. Load errors must never propagate into app start; the
/// gateway logs them and proceeds as signed out.
pub trait SessionStore: Send + Sync {
    /// Read the persisted session, if any.
    fn load(&self) -> AuthResult<Option<AuthSession>>;

    /// Persist a session, replacing any previous one.
    fn save(&self, session: &AuthSession) -> AuthResult<()>;

    /// Remove the persisted session.
    fn clear(&self) -> AuthResult<()>;
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store, as if a previous run had saved a session.
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn save(&self, session: &AuthSession) -> AuthResult<()> {
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}
