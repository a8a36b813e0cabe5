//! JSON-file session persistence.

use std::path::PathBuf;
use venered_auth::{AuthResult, SessionStore};
use venered_types::AuthSession;

/// Persists the session as JSON at a fixed path (~/.venered/session.json).
///
/// The file uses the session wire shape, so anything that wrote a session
/// here can be read back regardless of which backend produced it.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> AuthResult<Option<AuthSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let session: AuthSession = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    fn save(&self, session: &AuthSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use venered_types::User;

    fn test_session() -> AuthSession {
        let now = Utc::now();
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
                created_at: now,
                updated_at: now,
            },
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: now.timestamp() + 3600,
        }
    }

    #[test]
    fn save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));

        let session = test_session();
        store.save(&session).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn load_without_a_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn clear_removes_the_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));

        store.save(&test_session()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());

        // Clearing again is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_surfaces_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileSessionStore::new(path);
        assert!(store.load().is_err());
    }
}
