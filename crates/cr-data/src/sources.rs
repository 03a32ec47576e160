use serde::{Deserialize, Serialize};

use cr_types::{config_error, CrResult};

pub const DEFAULT_CRYPTOCOMPARE_URL: &str = "https://min-api.cryptocompare.com";
pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";

const ENV_CRYPTOCOMPARE_URL: &str = "CRYPTORISK_CRYPTOCOMPARE_URL";
const ENV_CRYPTOCOMPARE_API_KEY: &str = "CRYPTORISK_CRYPTOCOMPARE_API_KEY";
const ENV_YAHOO_URL: &str = "CRYPTORISK_YAHOO_URL";
const ENV_HTTP_TIMEOUT_SECS: &str = "CRYPTORISK_HTTP_TIMEOUT_SECS";

/// Connection settings for the HTTP price providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub cryptocompare_url: String,
    #[serde(default)]
    pub cryptocompare_api_key: Option<String>,
    pub yahoo_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cryptocompare_url: DEFAULT_CRYPTOCOMPARE_URL.to_string(),
            cryptocompare_api_key: None,
            yahoo_url: DEFAULT_YAHOO_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("cryptorisk/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ProviderConfig {
    /// Defaults overridden by `CRYPTORISK_*` environment variables.
    pub fn from_env() -> CrResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup<F>(lookup: F) -> CrResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_CRYPTOCOMPARE_URL) {
            config.cryptocompare_url = url;
        }
        if let Some(key) = lookup(ENV_CRYPTOCOMPARE_API_KEY).filter(|k| !k.is_empty()) {
            config.cryptocompare_api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_YAHOO_URL) {
            config.yahoo_url = url;
        }
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            config.timeout_secs = raw.trim().parse().map_err(|e| {
                config_error!("{} must be a whole number of seconds, got '{}': {}", ENV_HTTP_TIMEOUT_SECS, raw, e)
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.cryptocompare_api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn validate(&self) -> CrResult<()> {
        if self.timeout_secs == 0 {
            return Err(config_error!("HTTP timeout must be positive"));
        }
        for (name, url) in [("CryptoCompare", &self.cryptocompare_url), ("Yahoo", &self.yahoo_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(config_error!("{} base URL must be http(s), got '{}'", name, url));
            }
        }
        Ok(())
    }
}

/// How much history each provider family is asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Daily candles requested from the history API.
    pub stablecoin_candle_limit: u32,
    /// Calendar days, ending today, requested from the market-data API.
    pub general_lookback_days: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            stablecoin_candle_limit: 720,
            general_lookback_days: 520,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_types::CrError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ProviderConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.cryptocompare_url, DEFAULT_CRYPTOCOMPARE_URL);
        assert!(config.cryptocompare_api_key.is_none());
    }

    #[test]
    fn environment_overrides() {
        let config = ProviderConfig::from_lookup(lookup_from(&[
            ("CRYPTORISK_CRYPTOCOMPARE_API_KEY", "secret"),
            ("CRYPTORISK_YAHOO_URL", "http://localhost:9000"),
            ("CRYPTORISK_HTTP_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.cryptocompare_api_key.as_deref(), Some("secret"));
        assert_eq!(config.yahoo_url, "http://localhost:9000");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let config =
            ProviderConfig::from_lookup(lookup_from(&[("CRYPTORISK_CRYPTOCOMPARE_API_KEY", "")])).unwrap();
        assert!(config.cryptocompare_api_key.is_none());
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = ProviderConfig::from_lookup(lookup_from(&[("CRYPTORISK_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, CrError::Config(_)));

        let err = ProviderConfig::from_lookup(lookup_from(&[("CRYPTORISK_HTTP_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, CrError::Config(_)));
    }

    #[test]
    fn bad_url_is_a_config_error() {
        let err = ProviderConfig::from_lookup(lookup_from(&[("CRYPTORISK_CRYPTOCOMPARE_URL", "ftp://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("CryptoCompare"));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = ProviderConfig::default().with_api_key("k").with_timeout_secs(10);
        let json = serde_json::to_string(&config).unwrap();
        let back: ProviderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);

        let fetch: FetchConfig = serde_json::from_str(r#"{"stablecoin_candle_limit":30,"general_lookback_days":10}"#).unwrap();
        assert_eq!(fetch.stablecoin_candle_limit, 30);
        assert_eq!(FetchConfig::default().general_lookback_days, 520);
    }
}
