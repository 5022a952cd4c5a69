use crate::error::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `base_url`.
pub const BASE_URL_ENV_VAR: &str = "NFTEL_BASE_URL";

const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Settings for the gateway and the query cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the aggregation service; endpoint paths are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds a fetched payload stays fresh.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Automatic retries after a failed attempt.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause before each retry, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout; unset keeps the transport default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Maximum number of resident cache entries.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_stale_after_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_cache_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stale_after_secs: default_stale_after_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: None,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl ClientConfig {
    /// Load a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(BASE_URL_ENV_VAR)
            && !value.trim().is_empty()
        {
            self.base_url = value.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;

        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be > 0".to_string()));
        }

        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "retry_attempts must be <= {MAX_RETRY_ATTEMPTS}, got {}",
                self.retry_attempts
            )));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|err| ConfigError::Invalid(format!("base_url `{}`: {err}", self.base_url)))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url `{}` must be an http(s) URL",
                self.base_url
            )));
        }
        Ok(url)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.stale_after(), Duration::from_secs(60));
        assert_eq!(config.retry_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
base_url = "https://metrics.example.org/api/"
retry_delay_ms = 0
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://metrics.example.org/api/");
        assert_eq!(config.retry_delay(), Duration::ZERO);
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();
        config.cache_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.retry_attempts = 9;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.base_url = "ftp://example.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stale_after_secs = 15").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(15));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ClientConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_unknown_types_are_parse_errors() {
        assert!(matches!(
            ClientConfig::from_toml("cache_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
