//! User profile type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account UUID assigned by the backend.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Unique handle.
    pub username: String,
    /// Name shown in the UI.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Whether the profile is only visible to accepted followers.
    pub is_private: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
