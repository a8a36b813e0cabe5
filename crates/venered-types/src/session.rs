//! Authenticated session type.

use crate::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successful authentication: the signed-in user plus the credential pair.
///
/// A session is either fully present or entirely absent. Consumers receive
/// owned clones, never a handle into mutable state, so a half-constructed
/// session is never observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry time in seconds since the Unix epoch.
    pub expires_at: i64,
}

impl AuthSession {
    /// Whether the access token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }

    /// Seconds until expiry as of `now`; negative once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at - now.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(expires_at: i64) -> AuthSession {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        AuthSession {
            user: User {
                id: "user-0123".to_string(),
                email: "demo@example.com".to_string(),
                username: "demouser".to_string(),
                display_name: "Demo User".to_string(),
                bio: Some("Demo account".to_string()),
                avatar_url: None,
                website: None,
                is_private: false,
                is_verified: true,
                created_at: created,
                updated_at: created,
            },
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at,
        }
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let s = session(now.timestamp() + 3600);

        assert!(!s.is_expired(now));
        assert_eq!(s.expires_in(now), 3600);
        assert!(s.is_expired(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn wire_shape_round_trips() {
        let s = session(1_717_243_200);

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["user"]["id"], "user-0123");
        assert_eq!(json["user"]["display_name"], "Demo User");
        assert_eq!(json["access_token"], "access-token");
        assert_eq!(json["refresh_token"], "refresh-token");
        assert_eq!(json["expires_at"], 1_717_243_200);

        let back: AuthSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
