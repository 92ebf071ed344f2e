// =============================================================================
// Runtime Configuration — endpoints, default selection, buffer limits
// =============================================================================
//
// Loaded once at startup from `runtime_config.json`; every field carries a
// serde default so partial or empty files load. Environment variables
// override the endpoints and bind address. The file is never written back.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{is_known_pair, PriceType, Selection, Tenor, Timeframe};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_currency_pair() -> String {
    "EURUSD".to_string()
}

fn default_max_candles() -> usize {
    1000
}

fn default_history_timeout_secs() -> u64 {
    10
}

fn default_push_interval_ms() -> u64 {
    500
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Endpoints ----------------------------------------------------------

    /// Streaming quote endpoint (`ws://` or `wss://`). No live data when
    /// absent.
    #[serde(default)]
    pub ws_endpoint: Option<String>,

    /// Historical candle endpoint (`http://` or `https://`). A synthetic
    /// series is shown when absent.
    #[serde(default)]
    pub history_endpoint: Option<String>,

    /// Address the dashboard API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Initial selection --------------------------------------------------

    #[serde(default = "default_currency_pair")]
    pub default_currency_pair: String,

    #[serde(default)]
    pub default_tenor: Tenor,

    #[serde(default)]
    pub default_timeframe: Timeframe,

    #[serde(default)]
    pub default_price_type: PriceType,

    // --- Limits & timing ----------------------------------------------------

    /// Rolling window size of the live candle store.
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,

    /// Timeout for one historical fetch.
    #[serde(default = "default_history_timeout_secs")]
    pub history_timeout_secs: u64,

    /// How often dashboard WebSocket clients are checked for fresh state.
    #[serde(default = "default_push_interval_ms")]
    pub push_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: None,
            history_endpoint: None,
            bind_addr: default_bind_addr(),
            default_currency_pair: default_currency_pair(),
            default_tenor: Tenor::SPOT,
            default_timeframe: Timeframe::M1,
            default_price_type: PriceType::Mid,
            max_candles: default_max_candles(),
            history_timeout_secs: default_history_timeout_secs(),
            push_interval_ms: default_push_interval_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            ws_endpoint = ?config.ws_endpoint,
            history_endpoint = ?config.history_endpoint,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`). Empty values
    /// clear an endpoint.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = |raw: String| {
            let trimmed = raw.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        };

        if let Some(ws) = lookup("FXCHART_WS_ENDPOINT") {
            self.ws_endpoint = endpoint(ws);
        }
        if let Some(history) = lookup("FXCHART_HISTORY_ENDPOINT") {
            self.history_endpoint = endpoint(history);
        }
        if let Some(addr) = lookup("FXCHART_BIND_ADDR") {
            let addr = addr.trim();
            if !addr.is_empty() {
                self.bind_addr = addr.to_string();
            }
        }
    }

    /// Reject settings the feed cannot run with.
    pub fn validate(&self) -> Result<()> {
        let pair = self.default_currency_pair.to_uppercase();
        if !is_known_pair(&pair) {
            anyhow::bail!("default_currency_pair '{}' is not a supported pair", self.default_currency_pair);
        }
        if let Some(ws) = &self.ws_endpoint {
            check_scheme(ws, &["ws", "wss"]).context("invalid ws_endpoint")?;
        }
        if let Some(history) = &self.history_endpoint {
            check_scheme(history, &["http", "https"]).context("invalid history_endpoint")?;
        }
        if self.max_candles == 0 {
            anyhow::bail!("max_candles must be at least 1");
        }
        Ok(())
    }

    /// The selection the chart starts with.
    pub fn initial_selection(&self) -> Selection {
        Selection {
            currency_pair: self.default_currency_pair.to_uppercase(),
            tenor: self.default_tenor,
            timeframe: self.default_timeframe,
            price_type: self.default_price_type,
        }
    }
}

fn check_scheme(raw: &str, allowed: &[&str]) -> Result<()> {
    let url = reqwest::Url::parse(raw).with_context(|| format!("'{raw}' is not a valid URL"))?;
    if !allowed.contains(&url.scheme()) {
        anyhow::bail!("'{raw}' must use one of {allowed:?}");
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.ws_endpoint.is_none());
        assert!(cfg.history_endpoint.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.max_candles, 1000);
        assert_eq!(cfg.push_interval_ms, 500);
        assert_eq!(cfg.initial_selection(), Selection::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "ws_endpoint": "wss://quotes.example/realtime",
            "default_currency_pair": "usdjpy",
            "default_tenor": "M3",
            "default_timeframe": "15M",
            "default_price_type": "ask"
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.ws_endpoint.as_deref(), Some("wss://quotes.example/realtime"));
        assert_eq!(cfg.max_candles, 1000);

        let sel = cfg.initial_selection();
        assert_eq!(sel.currency_pair, "USDJPY");
        assert_eq!(sel.tenor.label(), "M3");
        assert_eq!(sel.timeframe, Timeframe::M15);
        assert_eq!(sel.price_type, PriceType::Ask);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = RuntimeConfig::default();
        cfg.ws_endpoint = Some("https://not-a-socket.example".into());
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.history_endpoint = Some("ftp://files.example/history".into());
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.default_currency_pair = "BTCUSD".into();
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.max_candles = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_replace_and_clear_endpoints() {
        let mut cfg = RuntimeConfig::default();
        cfg.history_endpoint = Some("http://old.example/history".into());

        let env: HashMap<&str, &str> = [
            ("FXCHART_WS_ENDPOINT", "ws://localhost:9000/rt"),
            ("FXCHART_HISTORY_ENDPOINT", "  "),
            ("FXCHART_BIND_ADDR", "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.ws_endpoint.as_deref(), Some("ws://localhost:9000/rt"));
        assert!(cfg.history_endpoint.is_none());
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/runtime_config.json").is_err());
    }
}
