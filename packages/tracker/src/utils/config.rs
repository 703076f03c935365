// packages/tracker/src/utils/config.rs
//! Tracker configuration
//!
//! Loaded from an optional `session-tracker.{toml,yaml,json}` file overlaid
//! with `SESSION_TRACKER_*` environment variables, or built in code with
//! [`TrackerConfig::new`].

use crate::utils::errors::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_FILE: &str = "session-tracker";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SESSION_TRACKER";

/// Tracker configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the collection endpoint
    pub api_endpoint: String,

    /// Session id to use when a new session has to be minted
    pub session_id: Option<String>,

    /// Period between buffer drains (milliseconds)
    pub flush_interval_ms: u64,

    /// Inactivity window before a persisted session expires (minutes)
    pub session_timeout_mins: u64,

    /// Full-snapshot interval requested from the capture adapter (milliseconds)
    pub checkpoint_interval_ms: u64,

    /// Require an explicit toggle before recording starts
    pub opt_in: bool,

    /// Create a visible toggle widget. Defaults to `opt_in`.
    pub show_widget: Option<bool>,

    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub app_name: Option<String>,

    /// Extra metadata merged into every delivery request
    pub metadata: Map<String, Value>,

    /// SQLite file backing the durable session store
    pub store_path: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            session_id: None,
            flush_interval_ms: 5_000,
            session_timeout_mins: 30,
            checkpoint_interval_ms: 30_000,
            opt_in: false,
            show_widget: None,
            user_id: None,
            user_email: None,
            user_name: None,
            app_name: None,
            metadata: Map::new(),
            store_path: None,
        }
    }
}

impl TrackerConfig {
    /// Create a configuration with defaults for the given endpoint
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            ..Default::default()
        }
    }

    /// Load from `session-tracker.*` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from the given file (optional) and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TrackerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.api_endpoint.trim();
        if endpoint.is_empty() {
            return Err(TrackerError::ConfigError(
                "api_endpoint must be set".to_string(),
            ));
        }
        if !endpoint.starts_with("http://") {
            return Err(TrackerError::ConfigError(format!(
                "api_endpoint must be an http:// URL, got {}",
                endpoint
            )));
        }
        if self.flush_interval_ms == 0 {
            return Err(TrackerError::ConfigError(
                "flush_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.session_timeout_mins == 0 {
            return Err(TrackerError::ConfigError(
                "session_timeout_mins must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.session_id, Some(id) if id.trim().is_empty()) {
            return Err(TrackerError::ConfigError(
                "session_id must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_mins.saturating_mul(60))
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval_ms)
    }

    /// Whether a toggle widget should be created
    pub fn show_widget(&self) -> bool {
        self.show_widget.unwrap_or(self.opt_in)
    }

    /// Endpoint without a trailing slash
    pub fn endpoint_base(&self) -> &str {
        self.api_endpoint.trim().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::new("http://localhost:3001");
        assert_eq!(config.flush_interval(), Duration::from_millis(5_000));
        assert_eq!(config.session_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.checkpoint_interval(), Duration::from_secs(30));
        assert!(!config.opt_in);
        assert!(!config.show_widget());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_show_widget_follows_opt_in() {
        let mut config = TrackerConfig::new("http://localhost:3001");
        config.opt_in = true;
        assert!(config.show_widget());

        config.show_widget = Some(false);
        assert!(!config.show_widget());
    }

    #[test]
    fn test_validation() {
        assert!(TrackerConfig::default().validate().is_err());
        assert!(TrackerConfig::new("ftp://example.com").validate().is_err());

        let zero_interval = TrackerConfig {
            flush_interval_ms: 0,
            ..TrackerConfig::new("http://localhost:3001")
        };
        assert!(zero_interval.validate().is_err());

        let blank_id = TrackerConfig {
            session_id: Some("  ".to_string()),
            ..TrackerConfig::new("http://localhost:3001")
        };
        assert!(blank_id.validate().is_err());
    }

    #[test]
    fn test_endpoint_base_strips_trailing_slash() {
        let config = TrackerConfig::new("http://collector.local/api/");
        assert_eq!(config.endpoint_base(), "http://collector.local/api");
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
api_endpoint = "http://collector.local"
flush_interval_ms = 1000
opt_in = true
app_name = "checkout"

[metadata]
tenant = "acme"
"#
        )
        .unwrap();

        let config = TrackerConfig::load_from(&path).unwrap();
        assert_eq!(config.api_endpoint, "http://collector.local");
        assert_eq!(config.flush_interval_ms, 1000);
        assert_eq!(config.session_timeout_mins, 30);
        assert!(config.opt_in);
        assert!(config.show_widget());
        assert_eq!(config.app_name.as_deref(), Some("checkout"));
        assert_eq!(config.metadata["tenant"], "acme");
    }

    #[test]
    fn test_environment_overlays_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "api_endpoint = \"http://collector.local\"\n").unwrap();

        std::env::set_var("SESSION_TRACKER_USER_NAME", "Ada");
        std::env::set_var("SESSION_TRACKER_METADATA__REGION", "eu-west");
        let result = TrackerConfig::load_from(&path);
        std::env::remove_var("SESSION_TRACKER_USER_NAME");
        std::env::remove_var("SESSION_TRACKER_METADATA__REGION");

        let config = result.unwrap();
        assert_eq!(config.api_endpoint, "http://collector.local");
        assert_eq!(config.user_name.as_deref(), Some("Ada"));
        assert_eq!(config.metadata["region"], "eu-west");
    }

    #[test]
    fn test_huge_session_timeout_saturates() {
        let config = TrackerConfig {
            session_timeout_mins: u64::MAX,
            ..TrackerConfig::new("http://localhost:3001")
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.session_timeout(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_load_from_missing_file_requires_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let result = TrackerConfig::load_from(dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
