//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
///
/// Gateway implementations normalize whatever the backend reports into one
/// of these variants before returning; the state holder re-throws them
/// untouched so the UI always has a classified error to display.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed input rejected before or at the backend
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No matching account/password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Sign-up for an email that is already registered
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// Backend accepted the credentials but yielded no session
    #[error("Backend accepted the credentials but returned no session")]
    NoSessionReturned,

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Session persistence error
    #[error("Session store error: {0}")]
    Store(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unclassified backend error
    #[error("Backend error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be
    /// retried.
    ///
    /// Transient errors include:
    /// - Connection errors and timeouts
    /// - HTTP errors with 5xx status codes
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Timeout => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Message suitable for direct display in the UI.
    ///
    /// Every explicit operation failure surfaces through here; the raw
    /// variant text stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::ValidationFailed(msg) => msg.clone(),
            AuthError::InvalidCredentials(_) => "Invalid email or password.".to_string(),
            AuthError::AlreadyExists(_) => {
                "An account with this email already exists.".to_string()
            }
            AuthError::NoSessionReturned => {
                "Could not start a session. Please try again.".to_string()
            }
            AuthError::TokenRefresh(_) | AuthError::RefreshExhausted(_) => {
                "Your session could not be renewed. Please sign in again.".to_string()
            }
            AuthError::Timeout => {
                "The request timed out. Check your connection and try again.".to_string()
            }
            AuthError::Http(e) if e.is_connect() || e.is_timeout() => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
