//! Configuration management for dondeayudo.
//!
//! Loaded with figment from defaults, an optional TOML file and
//! `DONDEAYUDO_` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";

const DATA_DIR_NAME: &str = "dondeayudo";

const DATABASE_FILE_NAME: &str = "cache.db";

/// Largest page size the list endpoint is asked for.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Application configuration.
///
/// Sources, highest precedence first:
/// 1. Environment variables prefixed with `DONDEAYUDO_`, nested keys
///    separated by `__` (`DONDEAYUDO_API__BASE_URL`)
/// 2. TOML config file at `~/.config/dondeayudo/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API settings.
    pub api: ApiConfig,
    /// Local snapshot cache settings.
    pub cache: CacheConfig,
    /// Static fallback bundle settings.
    pub fallback: FallbackConfig,
}

/// Backend API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend; endpoints live under `/api`.
    pub base_url: String,
    /// Records requested per page.
    pub page_size: usize,
    /// Upper bound on pages fetched in one refresh.
    pub max_pages: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Keep points that are not publicly visible.
    pub include_unverified: bool,
    /// Bearer token for the admin endpoints.
    pub admin_token: Option<String>,
}

/// Local snapshot cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the cache database.
    /// Defaults to `~/.local/share/dondeayudo/cache.db`
    pub database_path: Option<PathBuf>,
    /// Largest snapshot accepted, in bytes.
    pub max_bytes: usize,
}

/// Static fallback bundle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Use the bundle when neither cache nor network has data.
    pub enabled: bool,
    /// Legacy-schema JSON file to use instead of the embedded bundle.
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            page_size: MAX_PAGE_SIZE,
            max_pages: 50,
            timeout_secs: 15,
            include_unverified: false,
            admin_token: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::figment(config_path).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        // Later providers override earlier ones
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("DONDEAYUDO_").split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.api.page_size) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "page_size ({}) must be between 1 and {MAX_PAGE_SIZE}",
                    self.api.page_size
                ),
            });
        }

        if self.api.max_pages == 0 {
            return Err(Error::ConfigValidation {
                message: "max_pages must be greater than 0".to_string(),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        match Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(Error::ConfigValidation {
                    message: format!("base_url must be http or https, got {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(Error::ConfigValidation {
                    message: format!("invalid base_url '{}': {e}", self.api.base_url),
                });
            }
        }

        if self.cache.max_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "max_bytes must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.cache
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// A copy safe to print, with the admin token masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.api.admin_token.is_some() {
            config.api.admin_token = Some("********".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.page_size, 1000);
        assert!(!config.api.include_unverified);
        assert!(config.api.admin_token.is_none());
        assert!(config.cache.database_path.is_none());
        assert!(config.fallback.enabled);
        assert!(config.fallback.path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_page_size_bounds() {
        let mut config = Config::default();
        config.api.page_size = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("page_size"));

        config.api.page_size = 1001;
        assert!(config.validate().is_err());

        config.api.page_size = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_values() {
        let mut config = Config::default();
        config.api.max_pages = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_pages"));

        let mut config = Config::default();
        config.api.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("timeout_secs"));

        let mut config = Config::default();
        config.cache.max_bytes = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_bytes"));
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("base_url"));

        config.api.base_url = "ftp://example.org".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("http"));

        config.api.base_url = "https://dondeayudo.cl".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("dondeayudo"));
        assert!(path.to_string_lossy().ends_with("cache.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.cache.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));
        assert_eq!(config.database_path(), PathBuf::from("/custom/path/db.sqlite"));
    }

    #[test]
    fn test_timeout() {
        assert_eq!(Config::default().timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = Config::default();
        assert_eq!(config.redacted(), config);

        config.api.admin_token = Some("secret".to_string());
        let shown = config.redacted();
        assert_eq!(shown.api.admin_token.as_deref(), Some("********"));
        assert_eq!(config.api.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("dondeayudo"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(config.is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://api.dondeayudo.cl"
page_size = 100

[fallback]
enabled = false
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.api.base_url, "https://api.dondeayudo.cl");
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.max_pages, 50);
        assert!(!config.fallback.enabled);
    }

    #[test]
    fn test_load_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[api]\npage_size = 5000").unwrap();

        let err = Config::load_from(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_load_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbase_url = ").unwrap();

        let err = Config::load_from(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }
}
