//! Process-wide session state holder.
//!
//! `AuthProvider` owns the session exclusively. All mutation funnels
//! through one reducer entry point; readers get owned snapshots or a
//! watch channel, never a reference into the holder. A background
//! listener applies the backend's change stream in delivery order, and
//! the initial loading state is raced against a deadline so it always
//! resolves even if the backend never answers.

use crate::gateway::{AuthGateway, SessionChange};
use crate::lifecycle::{LifecycleInput, LifecycleMachine, LifecycleState};
use crate::AuthResult;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use venered_types::{AuthSession, LoginCredentials, SignUpData, User};

/// Immutable view of the session state at a point in time.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub state: LifecycleState,
    pub session: Option<AuthSession>,
}

impl AuthSnapshot {
    /// True until the first definitive session determination arrives.
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Tuning knobs for the state holder.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// How long app start may wait for the backend's first change event
    /// before the loading state is forced to resolve to unauthenticated.
    pub resolve_deadline: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            resolve_deadline: Duration::from_secs(10),
        }
    }
}

/// The transition events the reducer applies, in delivery order.
#[derive(Debug, Clone)]
enum SessionEvent {
    /// A definitive session arrived (sign-in, restore, refresh, or a
    /// change-stream event carrying a session).
    Resolved(AuthSession),
    /// A definitive "no session" arrived.
    Cleared,
    /// The resolve deadline fired before the backend's first event.
    TimedOut,
}

struct ProviderInner {
    gateway: Arc<dyn AuthGateway>,
    machine: Mutex<LifecycleMachine>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
}

impl ProviderInner {
    /// The single mutation point. Applies one event to the lifecycle
    /// machine and publishes the resulting snapshot.
    fn apply(&self, event: SessionEvent) {
        let mut machine = self.machine.lock().unwrap();
        let old_state = LifecycleState::from(machine.state());

        let (input, session) = match event {
            SessionEvent::Resolved(session) => (LifecycleInput::SessionResolved, Some(session)),
            SessionEvent::Cleared => (LifecycleInput::SessionCleared, None),
            SessionEvent::TimedOut => (LifecycleInput::LoadingTimedOut, None),
        };

        if machine.consume(&input).is_err() {
            // Only the deadline input is undefined outside Unknown; a tick
            // that lost the race against the first event is dropped here.
            debug!(?input, state = ?old_state, "lifecycle input undefined in current state, ignored");
            return;
        }

        let new_state = LifecycleState::from(machine.state());
        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "session state transition");
        }

        // Published while the machine lock is held so snapshots can never
        // pair one event's state with another event's session.
        self.snapshot_tx.send_replace(AuthSnapshot {
            state: new_state,
            session,
        });
    }

    /// Change-stream events overwrite current state verbatim; the payload
    /// is ground truth, whatever the event kind says.
    fn apply_change(&self, change: SessionChange) {
        debug!(kind = ?change.kind, has_session = change.session.is_some(), "session change delivered");
        match change.session {
            Some(session) => self.apply(SessionEvent::Resolved(session)),
            None => self.apply(SessionEvent::Cleared),
        }
    }
}

/// Owner of the process-wide session state.
///
/// Constructed once at app start via [`AuthProvider::start`]; the UI layer
/// reads snapshots and invokes the async operations, and re-renders off
/// the [`watch`] channel.
pub struct AuthProvider {
    inner: Arc<ProviderInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthProvider {
    /// Subscribe to the gateway's change stream and start tracking session
    /// state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(gateway: Arc<dyn AuthGateway>, options: ProviderOptions) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot {
            state: LifecycleState::Unknown,
            session: None,
        });

        let inner = Arc::new(ProviderInner {
            gateway: Arc::clone(&gateway),
            machine: Mutex::new(LifecycleMachine::new()),
            snapshot_tx,
        });

        let changes = gateway.subscribe();
        let listener = tokio::spawn(run_listener(
            Arc::clone(&inner),
            changes,
            options.resolve_deadline,
        ));

        Self {
            inner,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Watch channel for state changes; the UI re-renders off this.
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.snapshot_tx.borrow().state
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.snapshot_tx.borrow().user().cloned()
    }

    /// Wait until the initial loading state has resolved.
    pub async fn ready(&self) -> AuthSnapshot {
        let mut rx = self.watch();
        let result = match rx.wait_for(|snapshot| !snapshot.is_loading()).await {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives inside self, so this arm is unreachable in
            // practice; fall back to whatever we hold now.
            Err(_) => self.snapshot(),
        };
        result
    }

    /// Exchange credentials for a session and become authenticated.
    ///
    /// The session is applied before this returns, so the caller can rely
    /// on authenticated state once the future resolves; the change-stream
    /// event that follows re-asserts the same truth. On failure the state
    /// is untouched and the error is surfaced for display.
    pub async fn sign_in(&self, credentials: &LoginCredentials) -> AuthResult<AuthSession> {
        let session = self.inner.gateway.sign_in(credentials).await?;
        info!(user_id = %session.user.id, "signed in");
        self.inner.apply(SessionEvent::Resolved(session.clone()));
        Ok(session)
    }

    /// Register a new account and sign in with the same credentials.
    ///
    /// Registration alone does not authenticate. If sign-up succeeds but
    /// the follow-up sign-in fails, the account exists and the caller
    /// observes the sign-in error; this is not retried here.
    pub async fn sign_up(&self, data: &SignUpData) -> AuthResult<AuthSession> {
        self.inner.gateway.sign_up(data).await?;
        self.sign_in(&data.credentials()).await
    }

    /// Invalidate the session backend-side and become unauthenticated.
    /// Safe to call when already signed out.
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.inner.gateway.sign_out().await?;
        info!("signed out");
        self.inner.apply(SessionEvent::Cleared);
        Ok(())
    }

    /// Ask the backend for its present session view and apply it.
    ///
    /// Restore failures were already flattened to "absent" by the gateway:
    /// the worst case is landing on the sign-in screen, never a wedged
    /// loading state.
    pub async fn restore(&self) -> AuthSnapshot {
        match self.inner.gateway.current_session().await {
            Some(session) => self.inner.apply(SessionEvent::Resolved(session)),
            None => self.inner.apply(SessionEvent::Cleared),
        }
        self.snapshot()
    }

    /// Release the change-stream subscription. After this returns no
    /// backend-side change can mutate the holder. Idempotent; also runs
    /// on drop.
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for AuthProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Applies the change stream to the holder, resolving the initial unknown
/// state against the deadline first.
async fn run_listener(
    inner: Arc<ProviderInner>,
    mut changes: broadcast::Receiver<SessionChange>,
    resolve_deadline: Duration,
) {
    let deadline = tokio::time::sleep(resolve_deadline);
    tokio::pin!(deadline);

    // Race the backend's first event against the deadline; whichever wins
    // resolves the loading state.
    let mut resolved = false;
    while !resolved {
        tokio::select! {
            event = changes.recv() => match event {
                Ok(change) => {
                    inner.apply_change(change);
                    resolved = true;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change stream lagged before first event");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("change stream closed before first event, resolving to unauthenticated");
                    inner.apply(SessionEvent::TimedOut);
                    return;
                }
            },
            () = &mut deadline => {
                warn!(
                    deadline_ms = resolve_deadline.as_millis() as u64,
                    "no session event before deadline, resolving to unauthenticated"
                );
                inner.apply(SessionEvent::TimedOut);
                resolved = true;
            }
        }
    }

    // From here on, events overwrite state verbatim in delivery order.
    loop {
        match changes.recv().await {
            Ok(change) => inner.apply_change(change),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "change stream lagged, continuing from latest");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
