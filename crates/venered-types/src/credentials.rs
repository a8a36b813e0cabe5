//! Transient input value objects for the auth operations.
//!
//! These are consumed by the call that receives them and never retained as
//! state.

use serde::{Deserialize, Serialize};

/// Email/password pair for sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Registration input for sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpData {
    pub email: String,
    pub password: String,
    pub username: String,
    pub display_name: String,
}

impl SignUpData {
    /// The credentials a fresh registration signs in with.
    pub fn credentials(&self) -> LoginCredentials {
        LoginCredentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}
