// Client-side defaults and environment/YAML configuration.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

pub(crate) const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub(crate) const DEFAULT_ALERT_BACKOFF_BASE_MS: u64 = 1_000;
pub(crate) const DEFAULT_ALERT_BACKOFF_CAP_MS: u64 = 30_000;
pub(crate) const DEFAULT_FACET_TTL_MS: u64 = 60_000;
pub(crate) const DEFAULT_FACET_DEBOUNCE_MS: u64 = 150;
pub(crate) const DEFAULT_PAGE_SIZE: usize = 10;

/// How long a resolved total row count is trusted before a page-0 fetch
/// probes it again. Invalidation and refresh always drop it.
pub(crate) const DEFAULT_TOTAL_TTL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout_ms: u64,
    pub alert_backoff_base_ms: u64,
    pub alert_backoff_cap_ms: u64,
    pub facet_ttl_ms: u64,
    pub facet_debounce_ms: u64,
    pub total_ttl_ms: u64,
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
struct ClientConfigOverride {
    base_url: Option<String>,
    bearer_token: Option<String>,
    request_timeout_ms: Option<u64>,
    alert_backoff_base_ms: Option<u64>,
    alert_backoff_cap_ms: Option<u64>,
    facet_ttl_ms: Option<u64>,
    facet_debounce_ms: Option<u64>,
    total_ttl_ms: Option<u64>,
    page_size: Option<usize>,
}

impl ClientConfig {
    pub fn from_env_or_yaml(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::from_env();
        let override_path = config_path
            .map(|value| value.to_string())
            .or_else(|| std::env::var("WATCHTOWER_CLIENT_CONFIG").ok());
        if let Some(path) = override_path.as_deref() {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read client config: {path}"))?;
            let override_cfg: ClientConfigOverride =
                serde_yaml::from_str(&contents).context("parse client config yaml")?;
            override_cfg.apply(&mut config);
        }
        Ok(config)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = read_string_env("WATCHTOWER_API_URL") {
            config.base_url = value;
        }
        if let Some(value) = read_string_env("WATCHTOWER_TOKEN") {
            config.bearer_token = Some(value);
        }
        if let Some(value) = read_u64_env("WATCHTOWER_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = value;
        }
        if let Some(value) = read_u64_env("WATCHTOWER_ALERT_BACKOFF_BASE_MS") {
            config.alert_backoff_base_ms = value;
        }
        if let Some(value) = read_u64_env("WATCHTOWER_ALERT_BACKOFF_CAP_MS") {
            config.alert_backoff_cap_ms = value;
        }
        if let Some(value) = read_u64_env("WATCHTOWER_FACET_TTL_MS") {
            config.facet_ttl_ms = value;
        }
        if let Some(value) = read_u64_env("WATCHTOWER_FACET_DEBOUNCE_MS") {
            config.facet_debounce_ms = value;
        }
        if let Some(value) = read_u64_env("WATCHTOWER_TOTAL_TTL_MS") {
            config.total_ttl_ms = value;
        }
        if let Some(value) = read_usize_env("WATCHTOWER_PAGE_SIZE") {
            config.page_size = value;
        }
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn alert_backoff_base(&self) -> Duration {
        Duration::from_millis(self.alert_backoff_base_ms)
    }

    pub fn alert_backoff_cap(&self) -> Duration {
        // A cap below the base would make every delay the cap; keep them ordered.
        Duration::from_millis(self.alert_backoff_cap_ms.max(self.alert_backoff_base_ms))
    }

    pub fn facet_ttl(&self) -> Duration {
        Duration::from_millis(self.facet_ttl_ms)
    }

    pub fn facet_debounce(&self) -> Duration {
        Duration::from_millis(self.facet_debounce_ms)
    }

    pub fn total_ttl(&self) -> Duration {
        Duration::from_millis(self.total_ttl_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            alert_backoff_base_ms: DEFAULT_ALERT_BACKOFF_BASE_MS,
            alert_backoff_cap_ms: DEFAULT_ALERT_BACKOFF_CAP_MS,
            facet_ttl_ms: DEFAULT_FACET_TTL_MS,
            facet_debounce_ms: DEFAULT_FACET_DEBOUNCE_MS,
            total_ttl_ms: DEFAULT_TOTAL_TTL_MS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfigOverride {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(value) = &self.base_url
            && !value.trim().is_empty()
        {
            config.base_url = value.trim().to_string();
        }
        if let Some(value) = &self.bearer_token
            && !value.is_empty()
        {
            config.bearer_token = Some(value.clone());
        }
        if let Some(value) = self.request_timeout_ms
            && value > 0
        {
            config.request_timeout_ms = value;
        }
        if let Some(value) = self.alert_backoff_base_ms
            && value > 0
        {
            config.alert_backoff_base_ms = value;
        }
        if let Some(value) = self.alert_backoff_cap_ms
            && value > 0
        {
            config.alert_backoff_cap_ms = value;
        }
        if let Some(value) = self.facet_ttl_ms
            && value > 0
        {
            config.facet_ttl_ms = value;
        }
        // Zero is meaningful here: it disables debouncing.
        if let Some(value) = self.facet_debounce_ms {
            config.facet_debounce_ms = value;
        }
        if let Some(value) = self.total_ttl_ms
            && value > 0
        {
            config.total_ttl_ms = value;
        }
        if let Some(value) = self.page_size
            && value > 0
        {
            config.page_size = value;
        }
    }
}

fn read_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_u64_env(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn read_usize_env(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    struct EnvGuard {
        keys: Vec<&'static str>,
    }

    impl EnvGuard {
        fn set(pairs: &[(&'static str, &str)]) -> Self {
            for (key, value) in pairs {
                unsafe {
                    std::env::set_var(key, value);
                }
            }
            Self {
                keys: pairs.iter().map(|(key, _)| *key).collect(),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                unsafe {
                    std::env::remove_var(key);
                }
            }
        }
    }

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.alert_backoff_base(), Duration::from_secs(1));
        assert_eq!(config.alert_backoff_cap(), Duration::from_secs(30));
        assert_eq!(config.facet_ttl(), Duration::from_secs(60));
        assert_eq!(config.facet_debounce(), Duration::from_millis(150));
        assert_eq!(config.page_size, 10);
        assert!(config.bearer_token.is_none());
    }

    #[test]
    #[serial]
    fn env_overrides_defaults_and_ignores_invalid_values() {
        let _guard = EnvGuard::set(&[
            ("WATCHTOWER_API_URL", "http://api.internal:9000"),
            ("WATCHTOWER_REQUEST_TIMEOUT_MS", "2500"),
            ("WATCHTOWER_PAGE_SIZE", "0"),
            ("WATCHTOWER_FACET_TTL_MS", "soon"),
        ]);
        let config = ClientConfig::from_env_or_yaml(None).expect("config");
        assert_eq!(config.base_url, "http://api.internal:9000");
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.facet_ttl_ms, DEFAULT_FACET_TTL_MS);
    }

    #[test]
    #[serial]
    fn yaml_override_wins_over_env() -> Result<()> {
        let _guard = EnvGuard::set(&[("WATCHTOWER_PAGE_SIZE", "25")]);
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "base_url: http://yaml.example\npage_size: 50\nfacet_debounce_ms: 0\nalert_backoff_cap_ms: 0"
        )?;
        let path = file.path().to_str().context("utf8 path")?;
        let config = ClientConfig::from_env_or_yaml(Some(path))?;
        assert_eq!(config.base_url, "http://yaml.example");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.facet_debounce(), Duration::ZERO);
        assert_eq!(config.alert_backoff_cap_ms, DEFAULT_ALERT_BACKOFF_CAP_MS);
        Ok(())
    }

    #[test]
    fn missing_override_file_is_an_error() {
        let err = ClientConfig::from_env_or_yaml(Some("/nonexistent/watchtower.yaml"))
            .expect_err("missing file");
        assert!(err.to_string().contains("read client config"));
    }

    #[test]
    fn cap_never_drops_below_base() {
        let config = ClientConfig {
            alert_backoff_base_ms: 5_000,
            alert_backoff_cap_ms: 1_000,
            ..ClientConfig::default()
        };
        assert_eq!(config.alert_backoff_cap(), Duration::from_secs(5));
    }
}
