//! Softphone configuration loaded from environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::device::Codec;

#[derive(Debug, Clone, Deserialize)]
pub struct SoftphoneConfig {
    /// Address of the hosting page; its query may carry a `token`
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Token endpoint, resolved relative to `page_url`
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Timeout for a single token request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How often a pending renewal checks for an active call
    #[serde(default = "default_renewal_poll_interval", with = "humantime_serde")]
    pub renewal_poll_interval: Duration,

    /// Activity log capacity
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Codec order offered by the device, most preferred first
    #[serde(default = "default_codec_preferences")]
    pub codec_preferences: Vec<Codec>,
}

impl Default for SoftphoneConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            token_path: default_token_path(),
            request_timeout: default_request_timeout(),
            renewal_poll_interval: default_renewal_poll_interval(),
            max_log_entries: default_max_log_entries(),
            codec_preferences: default_codec_preferences(),
        }
    }
}

fn default_page_url() -> String {
    "http://localhost:3000/index.html".into()
}

fn default_token_path() -> String {
    "voice-token".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_renewal_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_log_entries() -> usize {
    10
}

fn default_codec_preferences() -> Vec<Codec> {
    vec![Codec::Opus, Codec::Pcmu]
}

impl SoftphoneConfig {
    /// Load configuration from `SOFTPHONE__*` environment variables
    /// (e.g. `SOFTPHONE__PAGE_URL`, `SOFTPHONE__CODEC_PREFERENCES=pcmu,opus`).
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SOFTPHONE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("codec_preferences")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the page address and token endpoint form valid URLs.
    pub fn validate(&self) -> Result<()> {
        let page = self.page_url()?;
        page.join(&self.token_path)
            .with_context(|| format!("Invalid token path: {}", self.token_path))?;
        if self.max_log_entries == 0 {
            anyhow::bail!("max_log_entries must be at least 1");
        }
        if self.codec_preferences.is_empty() {
            anyhow::bail!("codec_preferences must name at least one codec");
        }
        Ok(())
    }

    pub fn page_url(&self) -> Result<Url> {
        Url::parse(&self.page_url).with_context(|| format!("Invalid page URL: {}", self.page_url))
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_renewal_poll_interval(mut self, interval: Duration) -> Self {
        self.renewal_poll_interval = interval;
        self
    }

    pub fn with_max_log_entries(mut self, max: usize) -> Self {
        self.max_log_entries = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_dialpad_page() {
        let config = SoftphoneConfig::default();
        assert_eq!(config.renewal_poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_log_entries, 10);
        assert_eq!(config.codec_preferences, vec![Codec::Opus, Codec::Pcmu]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn token_path_resolves_next_to_the_page() {
        let config = SoftphoneConfig::default().with_page_url("https://phone.example.com/app/index.html");
        let endpoint = config.page_url().unwrap().join(&config.token_path).unwrap();
        assert_eq!(endpoint.as_str(), "https://phone.example.com/app/voice-token");
    }

    #[test]
    fn rejects_bad_page_url() {
        let config = SoftphoneConfig::default().with_page_url("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_prefixed_environment() {
        let vars = [
            ("SOFTPHONE__TOKEN_PATH", "api/token"),
            ("SOFTPHONE__MAX_LOG_ENTRIES", "25"),
            ("SOFTPHONE__RENEWAL_POLL_INTERVAL", "250ms"),
            ("SOFTPHONE__CODEC_PREFERENCES", "pcmu,opus"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let loaded = SoftphoneConfig::load();
        for (key, _) in vars {
            std::env::remove_var(key);
        }

        let config = loaded.unwrap();
        assert_eq!(config.token_path, "api/token");
        assert_eq!(config.max_log_entries, 25);
        assert_eq!(config.renewal_poll_interval, Duration::from_millis(250));
        assert_eq!(config.codec_preferences, vec![Codec::Pcmu, Codec::Opus]);
        assert_eq!(config.page_url, default_page_url());
    }

    #[test]
    fn rejects_empty_log() {
        let config = SoftphoneConfig::default().with_max_log_entries(0);
        assert!(config.validate().is_err());
    }
}
