//! Supabase auth backend.
//!
//! Implements [`AuthGateway`] against the GoTrue REST endpoints of a
//! Supabase project and normalizes its errors into [`AuthError`]. The
//! gateway keeps the backend-side session in memory (the way the official
//! client does), writes it through to an optional [`SessionStore`], and
//! emits change events from its own operations; GoTrue has no push
//! channel, so session changes are generated client-side.

use crate::gateway::{
    AuthGateway, ChangeKind, SessionChange, SessionChanges, CHANGE_CHANNEL_CAPACITY,
};
use crate::store::SessionStore;
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use venered_types::{AuthSession, LoginCredentials, SignUpData, User};

/// Fallback token lifetime when the backend reports neither `expires_at`
/// nor `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms.saturating_mul(2u64.pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Password grant request body.
#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Refresh grant request body.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Sign-up request body; profile fields travel as user metadata.
#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct SignUpMetadata<'a> {
    username: &'a str,
    display_name: &'a str,
}

/// GoTrue token endpoint response. All fields optional so a contract
/// violation surfaces as [`AuthError::NoSessionReturned`] instead of a
/// parse error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthResult<AuthSession> {
        let (Some(access_token), Some(refresh_token), Some(user)) =
            (self.access_token, self.refresh_token, self.user)
        else {
            return Err(AuthError::NoSessionReturned);
        };

        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now.timestamp() + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));

        Ok(AuthSession {
            user: user.into_user(now),
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

/// GoTrue user object.
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    user_metadata: ProfileMetadata,
}

impl GoTrueUser {
    fn into_user(self, now: DateTime<Utc>) -> User {
        let email = self.email.unwrap_or_default();
        let meta = self.user_metadata;
        let username = meta
            .username
            .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());
        let display_name = meta.display_name.unwrap_or_else(|| username.clone());

        User {
            id: self.id,
            email,
            username,
            display_name,
            bio: meta.bio,
            avatar_url: meta.avatar_url,
            website: meta.website,
            is_private: meta.is_private.unwrap_or(false),
            is_verified: meta.is_verified.unwrap_or(false),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

/// Profile fields stored in GoTrue user metadata.
#[derive(Debug, Default, Deserialize)]
struct ProfileMetadata {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    is_verified: Option<bool>,
}

/// GoTrue error body. Field names vary between endpoint versions.
#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a GoTrue error response into the [`AuthError`] taxonomy.
///
/// Known error codes classify directly; 5xx responses are unclassified
/// backend errors; everything else goes through the per-endpoint
/// `fallback`.
fn normalize_error(
    status: StatusCode,
    body: &str,
    fallback: impl FnOnce(String) -> AuthError,
) -> AuthError {
    let parsed: GoTrueErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .unwrap_or_else(|| format!("HTTP {status}"));

    match parsed.error_code.as_deref() {
        Some("user_already_exists" | "email_exists" | "phone_exists") => {
            AuthError::AlreadyExists(message)
        }
        Some("weak_password" | "validation_failed" | "email_address_invalid") => {
            AuthError::ValidationFailed(message)
        }
        Some("invalid_credentials" | "invalid_grant" | "user_not_found") => {
            AuthError::InvalidCredentials(message)
        }
        _ if status.is_server_error() => AuthError::Provider(format!("HTTP {status}: {message}")),
        _ => fallback(message),
    }
}

struct SupabaseState {
    session: Mutex<Option<AuthSession>>,
    changes: broadcast::Sender<SessionChange>,
    store: Option<Box<dyn SessionStore>>,
}

impl SupabaseState {
    /// Update the session view, write through to the store, and notify
    /// subscribers. The send happens under the session lock so subscribers
    /// observe changes in the order the session took its values.
    fn set_session(&self, kind: ChangeKind, session: Option<AuthSession>) {
        let mut current = self.session.lock().unwrap();
        *current = session.clone();

        if let Some(store) = &self.store {
            let result = match &session {
                Some(s) => store.save(s),
                None => store.clear(),
            };
            if let Err(e) = result {
                // Persistence is best-effort; the in-memory view stays valid
                warn!(error = %e, "failed to persist session change");
            }
        }

        let _ = self.changes.send(SessionChange { kind, session });
    }

    fn emit_initial(&self) {
        let current = self.session.lock().unwrap();
        let _ = self.changes.send(SessionChange {
            kind: ChangeKind::InitialSession,
            session: current.clone(),
        });
    }
}

/// [`AuthGateway`] implementation backed by a Supabase project.
pub struct SupabaseGateway {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    state: Arc<SupabaseState>,
    refresh_config: RefreshConfig,
}

impl SupabaseGateway {
    /// Create a gateway without persistence.
    ///
    /// # Arguments
    /// * `supabase_url` - The project API URL (e.g., `https://xyz.supabase.co`)
    /// * `publishable_key` - The publishable API key
    pub fn new(supabase_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self::build(supabase_url.into(), publishable_key.into(), None)
    }

    /// Create a gateway that loads the persisted session at construction
    /// and writes every session change through to `store`.
    pub fn with_store(
        supabase_url: impl Into<String>,
        publishable_key: impl Into<String>,
        store: Box<dyn SessionStore>,
    ) -> Self {
        Self::build(supabase_url.into(), publishable_key.into(), Some(store))
    }

    /// Override the refresh retry configuration.
    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    fn build(supabase_url: String, publishable_key: String, store: Option<Box<dyn SessionStore>>) -> Self {
        // A broken session file must not break app start: log and proceed
        // as signed out.
        let restored = store.as_ref().and_then(|s| match s.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to load persisted session, starting signed out");
                None
            }
        });
        if let Some(session) = &restored {
            debug!(user_id = %session.user.id, "restored persisted session");
        }

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            http_client: Client::new(),
            supabase_url,
            publishable_key,
            state: Arc::new(SupabaseState {
                session: Mutex::new(restored),
                changes,
                store,
            }),
            refresh_config: RefreshConfig::default(),
        }
    }

    /// Build the auth API URL for a path.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url.trim_end_matches('/'), path)
    }

    /// Refresh the session with exponential backoff, replacing it
    /// wholesale on success. Permanent failure clears the session.
    pub async fn refresh_session(&self) -> AuthResult<AuthSession> {
        let refresh_token = self
            .state
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(|| AuthError::TokenRefresh("no refresh token available".to_string()))?;

        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(&refresh_token).await {
                Ok(session) => {
                    info!(user_id = %session.user.id, "token refreshed");
                    self.state
                        .set_session(ChangeKind::TokenRefreshed, Some(session.clone()));
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);

                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "refresh failed with non-transient error, clearing session");
                    self.state.set_session(ChangeKind::SignedOut, None);
                    return Err(e);
                }
            }
        }

        warn!(
            "refresh failed after {} attempts",
            self.refresh_config.max_retries
        );
        self.state.set_session(ChangeKind::SignedOut, None);

        Err(last_error.unwrap_or(AuthError::RefreshExhausted(self.refresh_config.max_retries)))
    }

    /// Single refresh attempt.
    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let url = self.auth_url("token?grant_type=refresh_token");
        debug!(url = %url, "refreshing token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "token refresh rejected");
            return Err(normalize_error(status, &body, AuthError::TokenRefresh));
        }

        let data: TokenResponse = response.json().await?;
        data.into_session(Utc::now())
    }
}

#[async_trait]
impl AuthGateway for SupabaseGateway {
    async fn sign_up(&self, data: &SignUpData) -> AuthResult<()> {
        let url = self.auth_url("signup");
        debug!(url = %url, email = %data.email, "registering account");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&SignUpRequest {
                email: &data.email,
                password: &data.password,
                data: SignUpMetadata {
                    username: &data.username,
                    display_name: &data.display_name,
                },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "sign-up rejected");
            return Err(normalize_error(status, &body, |message| {
                if status == StatusCode::UNPROCESSABLE_ENTITY {
                    AuthError::ValidationFailed(message)
                } else {
                    AuthError::Provider(message)
                }
            }));
        }

        // Registration does not authenticate; any session in the response
        // body is discarded and the caller signs in explicitly.
        info!(email = %data.email, "account registered");
        Ok(())
    }

    async fn sign_in(&self, credentials: &LoginCredentials) -> AuthResult<AuthSession> {
        let url = self.auth_url("token?grant_type=password");
        debug!(url = %url, email = %credentials.email, "attempting password sign-in");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&PasswordGrantRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "sign-in rejected");
            return Err(normalize_error(status, &body, AuthError::InvalidCredentials));
        }

        let data: TokenResponse = response.json().await?;
        let session = data.into_session(Utc::now())?;

        self.state
            .set_session(ChangeKind::SignedIn, Some(session.clone()));
        info!(user_id = %session.user.id, "sign-in successful");
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let access_token = self
            .state
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.access_token.clone());

        // Already signed out: nothing to invalidate
        let Some(access_token) = access_token else {
            return Ok(());
        };

        let url = self.auth_url("logout");
        debug!(url = %url, "signing out");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .bearer_auth(&access_token)
            .send()
            .await?;

        let status = response.status();
        // 401/404 mean the token was already invalid server-side; local
        // state is cleared either way.
        if !(status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::NOT_FOUND)
        {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "sign-out failed");
            return Err(normalize_error(status, &body, AuthError::Provider));
        }

        self.state.set_session(ChangeKind::SignedOut, None);
        info!("signed out");
        Ok(())
    }

    async fn current_session(&self) -> Option<AuthSession> {
        let session = self.state.session.lock().unwrap().clone()?;

        if !session.is_expired(Utc::now()) {
            return Some(session);
        }

        // Expired: refresh before reporting. A failed refresh means "no
        // session" here - restoring must never fail the caller.
        match self.refresh_session().await {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                warn!(error = %e, "session restore failed, reporting signed out");
                None
            }
        }
    }

    fn subscribe(&self) -> SessionChanges {
        let rx = self.state.changes.subscribe();

        // Deliver the initial event shortly after subscribing so new
        // subscribers can resolve their unknown state without a separate
        // fetch.
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.emit_initial();
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use chrono::TimeZone;

    fn gateway() -> SupabaseGateway {
        SupabaseGateway::new("https://test.supabase.co", "test-key")
    }

    fn test_session(expires_at: i64) -> AuthSession {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        AuthSession {
            user: User {
                id: "user-1".to_string(),
                email: "demo@example.com".to_string(),
                username: "demouser".to_string(),
                display_name: "Demo User".to_string(),
                bio: None,
                avatar_url: None,
                website: None,
                is_private: false,
                is_verified: true,
                created_at: created,
                updated_at: created,
            },
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_auth_url() {
        let gw = gateway();
        assert_eq!(
            gw.auth_url("token?grant_type=password"),
            "https://test.supabase.co/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn test_auth_url_trims_trailing_slash() {
        let gw = SupabaseGateway::new("https://test.supabase.co/", "test-key");
        assert_eq!(gw.auth_url("signup"), "https://test.supabase.co/auth/v1/signup");
    }

    #[test]
    fn normalize_maps_known_error_codes() {
        let err = normalize_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error_code":"user_already_exists","msg":"User already registered"}"#,
            AuthError::Provider,
        );
        assert!(matches!(err, AuthError::AlreadyExists(m) if m == "User already registered"));

        let err = normalize_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#,
            AuthError::Provider,
        );
        assert!(matches!(err, AuthError::ValidationFailed(_)));

        let err = normalize_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
            AuthError::Provider,
        );
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[test]
    fn normalize_treats_server_errors_as_unclassified() {
        let err = normalize_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream unavailable",
            AuthError::InvalidCredentials,
        );
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[test]
    fn normalize_falls_back_per_endpoint() {
        // The token endpoint treats an unclassified 400 as bad credentials
        let err = normalize_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_description":"Invalid login credentials"}"#,
            AuthError::InvalidCredentials,
        );
        assert!(matches!(err, AuthError::InvalidCredentials(m) if m == "Invalid login credentials"));
    }

    #[test]
    fn normalize_survives_non_json_bodies() {
        let err = normalize_error(StatusCode::BAD_REQUEST, "<html>nope</html>", AuthError::Provider);
        assert!(matches!(err, AuthError::Provider(m) if m.contains("400")));
    }

    #[test]
    fn token_response_maps_into_session() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let data: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "user": {
                    "id": "user-9",
                    "email": "new@example.com",
                    "user_metadata": {
                        "username": "newbie",
                        "display_name": "New User"
                    }
                }
            }"#,
        )
        .unwrap();

        let session = data.into_session(now).unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.expires_at, now.timestamp() + 3600);
        assert_eq!(session.user.username, "newbie");
        assert_eq!(session.user.display_name, "New User");
        assert_eq!(session.user.created_at, now);
    }

    #[test]
    fn explicit_expires_at_wins_over_expires_in() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let data: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "expires_at": 1700000000,
                "user": {"id": "user-9"}
            }"#,
        )
        .unwrap();

        assert_eq!(data.into_session(now).unwrap().expires_at, 1_700_000_000);
    }

    #[test]
    fn missing_session_fields_violate_the_contract() {
        let now = Utc::now();
        let data: TokenResponse = serde_json::from_str(r#"{"user": {"id": "user-9"}}"#).unwrap();
        assert!(matches!(
            data.into_session(now),
            Err(AuthError::NoSessionReturned)
        ));
    }

    #[test]
    fn profile_falls_back_to_the_email_local_part() {
        let now = Utc::now();
        let user: GoTrueUser =
            serde_json::from_str(r#"{"id": "user-9", "email": "sam@example.com"}"#).unwrap();

        let mapped = user.into_user(now);
        assert_eq!(mapped.username, "sam");
        assert_eq!(mapped.display_name, "sam");
        assert!(!mapped.is_private);
        assert!(!mapped.is_verified);
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_refresh_config_delay_exponential_backoff() {
        let config = RefreshConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        // Capped from here on
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn persisted_session_is_restored_at_construction() {
        let future = Utc::now().timestamp() + 3600;
        let store = MemorySessionStore::with_session(test_session(future));

        let gw = SupabaseGateway::with_store(
            "https://test.supabase.co",
            "test-key",
            Box::new(store),
        );

        let session = gw.current_session().await.unwrap();
        assert_eq!(session.user.email, "demo@example.com");
    }

    #[tokio::test]
    async fn initial_event_carries_the_restored_session() {
        let future = Utc::now().timestamp() + 3600;
        let store = MemorySessionStore::with_session(test_session(future));
        let gw = SupabaseGateway::with_store(
            "https://test.supabase.co",
            "test-key",
            Box::new(store),
        );

        let mut changes = gw.subscribe();
        let change = changes.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::InitialSession);
        assert_eq!(change.session.unwrap().user.id, "user-1");
    }

    #[tokio::test]
    async fn broken_store_starts_signed_out() {
        struct BrokenStore;

        impl SessionStore for BrokenStore {
            fn load(&self) -> AuthResult<Option<AuthSession>> {
                Err(AuthError::Store("corrupt session file".to_string()))
            }
            fn save(&self, _session: &AuthSession) -> AuthResult<()> {
                Ok(())
            }
            fn clear(&self) -> AuthResult<()> {
                Ok(())
            }
        }

        let gw = SupabaseGateway::with_store(
            "https://test.supabase.co",
            "test-key",
            Box::new(BrokenStore),
        );
        assert!(gw.current_session().await.is_none());
    }
}
