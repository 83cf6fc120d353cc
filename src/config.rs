//! Configuration file parser for ~/.config/geotalk/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
//!
//! Config is operator-level and read-only. The user's radius and language
//! live in the settings store, not here.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::content::{DEFAULT_SEARCH_ENDPOINT, DEFAULT_SUMMARY_ENDPOINT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Geosearch endpoint template; `{lang}` is replaced by the language code.
    pub search_endpoint: String,

    /// Page summary endpoint template; the title is appended as a path segment.
    pub summary_endpoint: String,

    /// Sent with every request (Wikimedia rejects anonymous clients).
    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum number of nearby places requested.
    pub nearby_limit: u32,

    /// Database file. Defaults to `geotalk.db` in the config directory.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            summary_endpoint: DEFAULT_SUMMARY_ENDPOINT.to_string(),
            user_agent: concat!(
                "geotalk/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/dhofheinz/geotalk)"
            )
            .to_string(),
            request_timeout_secs: 20,
            nearby_limit: 20,
            database_path: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "search_endpoint",
        "summary_endpoint",
        "user_agent",
        "request_timeout_secs",
        "nearby_limit",
        "database_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            search_endpoint = %config.search_endpoint,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Database location, relative paths resolved against `config_dir`.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir.join(path),
            None => config_dir.join("geotalk.db"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("geotalk_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search_endpoint, "https://{lang}.wikipedia.org/w/api.php");
        assert_eq!(
            config.summary_endpoint,
            "https://{lang}.wikipedia.org/api/rest_v1/page/summary"
        );
        assert!(config.user_agent.starts_with("geotalk/"));
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.nearby_limit, 20);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/geotalk_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.nearby_limit, 20);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 20);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "nearby_limit = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.nearby_limit, 5);
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.search_endpoint, DEFAULT_SEARCH_ENDPOINT);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
search_endpoint = "https://{lang}.wikivoyage.org/w/api.php"
summary_endpoint = "https://{lang}.wikivoyage.org/api/rest_v1/page/summary"
user_agent = "tester/1.0"
request_timeout_secs = 5
nearby_limit = 50
database_path = "/var/lib/geotalk/places.db"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(config.search_endpoint, "https://{lang}.wikivoyage.org/w/api.php");
        assert_eq!(config.user_agent, "tester/1.0");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.nearby_limit, 50);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/geotalk/places.db"))
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "nearby_limit = \"many\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "nearby_limit = 3\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.nearby_limit, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_database_path_resolution() {
        let config_dir = Path::new("/home/user/.config/geotalk");

        let config = Config::default();
        assert_eq!(config.database_path(config_dir), config_dir.join("geotalk.db"));

        let config = Config {
            database_path: Some(PathBuf::from("other.db")),
            ..Config::default()
        };
        assert_eq!(config.database_path(config_dir), config_dir.join("other.db"));

        let config = Config {
            database_path: Some(PathBuf::from("/data/places.db")),
            ..Config::default()
        };
        assert_eq!(config.database_path(config_dir), PathBuf::from("/data/places.db"));
    }
}
