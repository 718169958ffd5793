//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase project id (set at compile time via WASEL_SUPABASE_PROJECT_ID).
pub const DEFAULT_SUPABASE_PROJECT_ID: Option<&str> = option_env!("WASEL_SUPABASE_PROJECT_ID");

/// Default Supabase publishable key (set at compile time via WASEL_SUPABASE_PUBLISHABLE_KEY).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: Option<&str> =
    option_env!("WASEL_SUPABASE_PUBLISHABLE_KEY");

/// Default site origin used for email confirmation redirects.
pub const DEFAULT_SITE_URL: &str = match option_env!("WASEL_SITE_URL") {
    Some(url) => url,
    None => "http://localhost:3000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_PROJECT_ID: &str = "WASEL_SUPABASE_PROJECT_ID";
const ENV_PUBLISHABLE_KEY: &str = "WASEL_SUPABASE_PUBLISHABLE_KEY";
const ENV_SITE_URL: &str = "WASEL_SITE_URL";
const ENV_LOG_LEVEL: &str = "WASEL_LOG_LEVEL";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project id; the API lives at `https://{id}.supabase.co`.
    #[serde(default = "default_project_id")]
    pub supabase_project_id: Option<String>,
    /// Supabase publishable (anon) key.
    #[serde(default = "default_publishable_key")]
    pub supabase_publishable_key: Option<String>,
    /// Site origin for the sign-up confirmation redirect.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Persist the session to disk between runs.
    #[serde(default = "default_persist_session")]
    pub persist_session: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_project_id() -> Option<String> {
    DEFAULT_SUPABASE_PROJECT_ID.map(|s| s.to_string())
}

fn default_publishable_key() -> Option<String> {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.map(|s| s.to_string())
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

fn default_persist_session() -> bool {
    true
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_project_id: default_project_id(),
            supabase_publishable_key: default_publishable_key(),
            site_url: default_site_url(),
            persist_session: default_persist_session(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if any), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get(ENV_PROJECT_ID) {
            self.supabase_project_id = Some(value);
        }
        if let Some(value) = get(ENV_PUBLISHABLE_KEY) {
            self.supabase_publishable_key = Some(value);
        }
        if let Some(value) = get(ENV_SITE_URL) {
            self.site_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
    }

    /// Both backend credentials are present and non-empty.
    pub fn is_backend_configured(&self) -> bool {
        non_empty(self.supabase_project_id.as_deref()).is_some()
            && non_empty(self.supabase_publishable_key.as_deref()).is_some()
    }

    /// The Supabase API URL built from the project id.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        let project_id = non_empty(self.supabase_project_id.as_deref())
            .ok_or_else(|| CoreError::Config("Supabase project id is not set".to_string()))?;
        Url::parse(&format!("https://{}.supabase.co", project_id)).map_err(CoreError::from)
    }

    /// The publishable key, if configured.
    pub fn publishable_key(&self) -> CoreResult<&str> {
        non_empty(self.supabase_publishable_key.as_deref())
            .ok_or_else(|| CoreError::Config("Supabase publishable key is not set".to_string()))
    }

    /// Where the confirmation email sends the user back to.
    pub fn email_redirect_url(&self) -> String {
        format!("{}/auth/callback", self.site_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn configured() -> Config {
        Config {
            supabase_project_id: Some("abcd1234".to_string()),
            supabase_publishable_key: Some("anon-key".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert!(config.persist_session);
    }

    #[test]
    fn test_backend_configured_requires_both_credentials() {
        let mut config = configured();
        assert!(config.is_backend_configured());

        config.supabase_publishable_key = Some("   ".to_string());
        assert!(!config.is_backend_configured());

        config.supabase_publishable_key = Some("anon-key".to_string());
        config.supabase_project_id = None;
        assert!(!config.is_backend_configured());
    }

    #[test]
    fn test_supabase_url_from_project_id() {
        let url = configured().supabase_url().unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("abcd1234.supabase.co"));
    }

    #[test]
    fn test_supabase_url_missing_project_id() {
        let mut config = configured();
        config.supabase_project_id = Some(String::new());
        assert!(matches!(config.supabase_url(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_supabase_url_invalid_project_id() {
        let mut config = configured();
        config.supabase_project_id = Some("not a host".to_string());
        assert!(config.supabase_url().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("WASEL_SUPABASE_PROJECT_ID", "proj"),
            ("WASEL_SUPABASE_PUBLISHABLE_KEY", "key"),
            ("WASEL_SITE_URL", "https://wasel.app/"),
            ("WASEL_LOG_LEVEL", ""),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.supabase_project_id.as_deref(), Some("proj"));
        assert_eq!(config.publishable_key().unwrap(), "key");
        assert_eq!(config.site_url, "https://wasel.app");
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.email_redirect_url(), "https://wasel.app/auth/callback");
    }

    #[test]
    fn test_config_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug", "persist_session": false }"#)
            .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(!config.persist_session);
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = configured();
        config.site_url = "https://example.org".to_string();
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.supabase_project_id.as_deref(), Some("abcd1234"));
        assert_eq!(loaded.site_url, "https://example.org");
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert!(config.persist_session);
    }
}
