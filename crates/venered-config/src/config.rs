//! Configuration management for the client core.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via VENERED_SUPABASE_URL).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("VENERED_SUPABASE_URL") {
    Some(url) => url,
    None => "https://project.supabase.co",
};

/// Default Supabase publishable key (compile-time via VENERED_SUPABASE_PUBLISHABLE_KEY).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str =
    match option_env!("VENERED_SUPABASE_PUBLISHABLE_KEY") {
        Some(key) => key,
        None => "publishable-key-not-set",
    };

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default deadline for resolving the initial loading state, in seconds.
pub const DEFAULT_RESOLVE_DEADLINE_SECS: u64 = 10;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// How long app start may wait for the backend's first session event
    /// before the loading state is forced to resolve.
    #[serde(default = "default_resolve_deadline_secs")]
    pub resolve_deadline_secs: u64,
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_resolve_deadline_secs() -> u64 {
    DEFAULT_RESOLVE_DEADLINE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_publishable_key: DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string(),
            resolve_deadline_secs: DEFAULT_RESOLVE_DEADLINE_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults.
    /// Note: supabase_url and supabase_publishable_key are compile-time
    /// only and always use the built-in defaults, regardless of what's in
    /// the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.supabase_url = DEFAULT_SUPABASE_URL.to_string();
        config.supabase_publishable_key = DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables. Only log_level
    /// can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("VENERED_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Whether a real Supabase project is configured.
    ///
    /// While the URL and key are still the built-in placeholders the app
    /// runs against the in-memory mock backend instead.
    pub fn is_supabase_configured(&self) -> bool {
        if self.supabase_url == "https://project.supabase.co"
            || self.supabase_publishable_key == "publishable-key-not-set"
        {
            return false;
        }
        Url::parse(&self.supabase_url).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_supabase_configured() {
        let config = Config::default();
        assert!(!config.is_supabase_configured());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.resolve_deadline_secs, DEFAULT_RESOLVE_DEADLINE_SECS);
    }

    #[test]
    fn configured_project_is_detected() {
        let config = Config {
            supabase_url: "https://abc123.supabase.co".to_string(),
            supabase_publishable_key: "sb_publishable_abc".to_string(),
            ..Config::default()
        };
        assert!(config.is_supabase_configured());
    }

    #[test]
    fn malformed_url_is_not_configured() {
        let config = Config {
            supabase_url: "not a url".to_string(),
            supabase_publishable_key: "sb_publishable_abc".to_string(),
            ..Config::default()
        };
        assert!(!config.is_supabase_configured());
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.supabase_url, DEFAULT_SUPABASE_URL);
    }

    #[test]
    fn save_and_reload_round_trips_log_level() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "debug".to_string(),
            resolve_deadline_secs: 3,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.resolve_deadline_secs, 3);
    }
}
