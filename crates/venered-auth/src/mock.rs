//! In-memory auth backend for local development and tests.
//!
//! Behaves like a hosted project with one pre-registered demo account:
//! `demo@example.com` / `password123`. Operations carry small artificial
//! delays so loading states are visible in the UI; tests construct the
//! backend with [`MockLatency::none`].

use crate::gateway::{
    AuthGateway, ChangeKind, SessionChange, SessionChanges, CHANGE_CHANNEL_CAPACITY,
};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;
use venered_types::{AuthSession, LoginCredentials, SignUpData, User};

/// Seeded demo account email.
pub const DEMO_EMAIL: &str = "demo@example.com";
/// Seeded demo account password.
pub const DEMO_PASSWORD: &str = "password123";

const SESSION_TTL_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

/// Artificial per-operation latency.
#[derive(Debug, Clone)]
pub struct MockLatency {
    pub sign_up: Duration,
    pub sign_in: Duration,
    pub sign_out: Duration,
    /// Applied to `current_session` and to the initial change event.
    pub fetch: Duration,
}

impl MockLatency {
    /// Latencies comparable to a real backend on a decent connection.
    pub fn realistic() -> Self {
        Self {
            sign_up: Duration::from_millis(200),
            sign_in: Duration::from_millis(200),
            sign_out: Duration::from_millis(100),
            fetch: Duration::from_millis(50),
        }
    }

    /// No delays. Use in tests.
    pub fn none() -> Self {
        Self {
            sign_up: Duration::ZERO,
            sign_in: Duration::ZERO,
            sign_out: Duration::ZERO,
            fetch: Duration::ZERO,
        }
    }
}

struct MockAccount {
    password: String,
    user: User,
}

struct MockState {
    accounts: Mutex<HashMap<String, MockAccount>>,
    session: Mutex<Option<AuthSession>>,
    changes: broadcast::Sender<SessionChange>,
}

impl MockState {
    /// Update the backend-side session and notify subscribers. The send
    /// happens under the session lock so subscribers always observe
    /// changes in the order the session actually took its values.
    fn notify(&self, kind: ChangeKind, session: Option<AuthSession>) {
        let mut current = self.session.lock().unwrap();
        *current = session.clone();
        // Send errors just mean nobody is subscribed
        let _ = self.changes.send(SessionChange { kind, session });
    }

    /// Report the current session to subscribers, also under the lock so
    /// the initial event can never carry a view older than a change that
    /// was already broadcast.
    fn emit_initial(&self) {
        let current = self.session.lock().unwrap();
        let _ = self.changes.send(SessionChange {
            kind: ChangeKind::InitialSession,
            session: current.clone(),
        });
    }
}

/// In-memory [`AuthGateway`] implementation.
pub struct MockGateway {
    state: Arc<MockState>,
    latency: MockLatency,
}

impl MockGateway {
    /// Create a mock backend with realistic latencies and the seeded demo
    /// account.
    pub fn new() -> Self {
        Self::with_latency(MockLatency::realistic())
    }

    /// Create a mock backend with custom latencies.
    pub fn with_latency(latency: MockLatency) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let gateway = Self {
            state: Arc::new(MockState {
                accounts: Mutex::new(HashMap::new()),
                session: Mutex::new(None),
                changes,
            }),
            latency,
        };
        gateway.seed_demo_account();
        gateway
    }

    fn seed_demo_account(&self) {
        let now = Utc::now();
        let demo = User {
            id: "user-0123".to_string(),
            email: DEMO_EMAIL.to_string(),
            username: "demouser".to_string(),
            display_name: "Demo User".to_string(),
            bio: Some("This is my demo bio".to_string()),
            avatar_url: None,
            website: None,
            is_private: false,
            is_verified: true,
            created_at: now,
            updated_at: now,
        };
        self.state.accounts.lock().unwrap().insert(
            DEMO_EMAIL.to_string(),
            MockAccount {
                password: DEMO_PASSWORD.to_string(),
                user: demo,
            },
        );
    }

    fn build_session(user: User) -> AuthSession {
        AuthSession {
            user,
            access_token: format!("mock_access_{}", Uuid::new_v4().simple()),
            refresh_token: format!("mock_refresh_{}", Uuid::new_v4().simple()),
            expires_at: Utc::now().timestamp() + SESSION_TTL_SECS,
        }
    }

    /// Replace the current session's tokens wholesale, as a backend-side
    /// refresh would, and notify subscribers.
    pub async fn refresh_session(&self) -> AuthResult<AuthSession> {
        let user = self
            .state
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or_else(|| AuthError::TokenRefresh("no session to refresh".to_string()))?;

        let session = Self::build_session(user);
        self.state
            .notify(ChangeKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGateway for MockGateway {
    async fn sign_up(&self, data: &SignUpData) -> AuthResult<()> {
        tokio::time::sleep(self.latency.sign_up).await;

        if !data.email.contains('@') {
            return Err(AuthError::ValidationFailed(
                "Invalid email address".to_string(),
            ));
        }
        if data.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::ValidationFailed(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.state.accounts.lock().unwrap();
        if accounts.contains_key(&data.email) {
            return Err(AuthError::AlreadyExists(data.email.clone()));
        }

        let now = Utc::now();
        let user = User {
            id: format!("user-{}", Uuid::new_v4().simple()),
            email: data.email.clone(),
            username: data.username.clone(),
            display_name: data.display_name.clone(),
            bio: None,
            avatar_url: None,
            website: None,
            is_private: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        debug!(email = %data.email, "mock account registered");
        accounts.insert(
            data.email.clone(),
            MockAccount {
                password: data.password.clone(),
                user,
            },
        );
        Ok(())
    }

    async fn sign_in(&self, credentials: &LoginCredentials) -> AuthResult<AuthSession> {
        tokio::time::sleep(self.latency.sign_in).await;

        let user = {
            let accounts = self.state.accounts.lock().unwrap();
            match accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => account.user.clone(),
                _ => {
                    return Err(AuthError::InvalidCredentials(
                        "Invalid login credentials".to_string(),
                    ))
                }
            }
        };

        let session = Self::build_session(user);
        self.state.notify(ChangeKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        tokio::time::sleep(self.latency.sign_out).await;
        self.state.notify(ChangeKind::SignedOut, None);
        Ok(())
    }

    async fn current_session(&self) -> Option<AuthSession> {
        tokio::time::sleep(self.latency.fetch).await;
        self.state.session.lock().unwrap().clone()
    }

    fn subscribe(&self) -> SessionChanges {
        let rx = self.state.changes.subscribe();

        // Deliver the initial event shortly after subscribing so new
        // subscribers can resolve their unknown state without a separate
        // fetch.
        let state = Arc::clone(&self.state);
        let delay = self.latency.fetch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.emit_initial();
        });

        rx
    }
}
