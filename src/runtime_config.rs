// =============================================================================
// Runtime Configuration: chart feed settings with atomic save
// =============================================================================
//
// Every tunable of the feed lives here: upstream endpoints, the initial
// selection, window sizes, polling cadence, indicator parameters and the
// renderer API bind address.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indicators::bollinger::{DEFAULT_BOLLINGER_PERIOD, DEFAULT_BOLLINGER_STD};
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::types::{Selection, Timeframe};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_exchange() -> String {
    "kraken".to_string()
}

fn default_symbol() -> String {
    "ADA/USD".to_string()
}

fn default_max_candles() -> usize {
    100
}

fn default_snapshot_limit() -> usize {
    100
}

fn default_trade_poll_secs() -> u64 {
    15
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_ema_fast() -> usize {
    20
}

fn default_ema_slow() -> usize {
    50
}

fn default_rsi_period() -> usize {
    DEFAULT_RSI_PERIOD
}

fn default_bollinger_period() -> usize {
    DEFAULT_BOLLINGER_PERIOD
}

fn default_bollinger_std() -> f64 {
    DEFAULT_BOLLINGER_STD
}

// =============================================================================
// IndicatorParams / IndicatorToggles
// =============================================================================

/// Look-back parameters for the indicator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Fast leg of the EMA pair.
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    /// Slow leg of the EMA pair.
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Band half-width in standard deviations.
    #[serde(default = "default_bollinger_std")]
    pub bollinger_std: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            rsi_period: default_rsi_period(),
            bollinger_period: default_bollinger_period(),
            bollinger_std: default_bollinger_std(),
        }
    }
}

/// Which indicator families are drawn. All off by default; the chart starts
/// with bare candles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorToggles {
    #[serde(default)]
    pub ema: bool,
    #[serde(default)]
    pub rsi: bool,
    #[serde(default)]
    pub bollinger: bool,
}

/// Partial toggle change; `None` leaves a family as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IndicatorUpdate {
    #[serde(default)]
    pub ema: Option<bool>,
    #[serde(default)]
    pub rsi: Option<bool>,
    #[serde(default)]
    pub bollinger: Option<bool>,
}

impl IndicatorToggles {
    /// Apply `update`, returning the human-readable list of changes.
    pub fn apply(&mut self, update: IndicatorUpdate) -> Vec<String> {
        let mut changes = Vec::new();

        macro_rules! apply_flag {
            ($field:ident) => {
                if let Some(val) = update.$field {
                    if self.$field != val {
                        changes.push(format!("{}: {} -> {}", stringify!($field), self.$field, val));
                        self.$field = val;
                    }
                }
            };
        }

        apply_flag!(ema);
        apply_flag!(rsi);
        apply_flag!(bollinger);

        changes
    }
}

// =============================================================================
// ChartConfig
// =============================================================================

/// Top-level configuration for the chart feed.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    // --- Upstream -----------------------------------------------------------

    /// Base URL of the market-data service (snapshot + trade journal).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL for push channels. Derived from `api_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,

    // --- Initial selection --------------------------------------------------

    #[serde(default = "default_exchange")]
    pub exchange: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default)]
    pub timeframe: Timeframe,

    // --- Windows & cadence --------------------------------------------------

    /// Maximum candles retained in memory.
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,

    /// `limit` sent with the historical snapshot request.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,

    /// Bot trade journal polling interval.
    #[serde(default = "default_trade_poll_secs")]
    pub trade_poll_secs: u64,

    /// Delay before re-running fetch+connect after the live channel drops.
    /// `0` disables timed reconnects: the feed then waits for a selection
    /// change or a manual retry.
    #[serde(default)]
    pub reconnect_delay_secs: u64,

    // --- Indicators ---------------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorToggles,

    #[serde(default)]
    pub indicator_params: IndicatorParams,

    // --- Renderer API -------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            exchange: default_exchange(),
            symbol: default_symbol(),
            timeframe: Timeframe::default(),
            max_candles: default_max_candles(),
            snapshot_limit: default_snapshot_limit(),
            trade_poll_secs: default_trade_poll_secs(),
            reconnect_delay_secs: 0,
            indicators: IndicatorToggles::default(),
            indicator_params: IndicatorParams::default(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl ChartConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read chart config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse chart config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            "chart config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise chart config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "chart config saved (atomic)");
        Ok(())
    }

    /// Apply `CHART_*` environment overrides on top of the file values.
    /// Invalid values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("CHART_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = non_empty("CHART_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Some(exchange) = non_empty("CHART_EXCHANGE") {
            self.exchange = exchange;
        }
        if let Some(symbol) = non_empty("CHART_SYMBOL") {
            self.symbol = symbol;
        }
        if let Some(tf) = non_empty("CHART_TIMEFRAME") {
            match tf.parse() {
                Ok(timeframe) => self.timeframe = timeframe,
                Err(e) => warn!(error = %e, "ignoring CHART_TIMEFRAME override"),
            }
        }
        if let Some(addr) = non_empty("CHART_BIND_ADDR") {
            self.bind_addr = addr;
        }
    }

    /// Push-channel base URL: explicit `ws_url`, or `api_url` with the scheme
    /// swapped (`http` → `ws`, `https` → `wss`).
    pub fn resolved_ws_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.trim_end_matches('/').to_string();
        }
        let base = self.api_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        }
    }

    /// The selection the feed starts on.
    pub fn initial_selection(&self) -> Selection {
        Selection::new(self.exchange.clone(), self.symbol.clone(), self.timeframe)
    }
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
        let cfg = ChartConfig::default();
        assert_eq!(cfg.exchange, "kraken");
        assert_eq!(cfg.symbol, "ADA/USD");
        assert_eq!(cfg.timeframe, Timeframe::M5);
        assert_eq!(cfg.max_candles, 100);
        assert_eq!(cfg.snapshot_limit, 100);
        assert_eq!(cfg.trade_poll_secs, 15);
        assert_eq!(cfg.reconnect_delay_secs, 0);
        assert_eq!(cfg.indicator_params.ema_fast, 20);
        assert_eq!(cfg.indicator_params.ema_slow, 50);
        assert_eq!(cfg.indicator_params.rsi_period, 14);
        assert_eq!(cfg.indicator_params.bollinger_period, 20);
        assert!((cfg.indicator_params.bollinger_std - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.indicators, IndicatorToggles::default());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ChartConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.api_url, "http://localhost:8000");
        assert_eq!(cfg.max_candles, 100);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "timeframe": "1h", "indicators": { "rsi": true }, "indicator_params": { "ema_fast": 9 } }"#;
        let cfg: ChartConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.timeframe, Timeframe::H1);
        assert!(cfg.indicators.rsi);
        assert!(!cfg.indicators.ema);
        assert_eq!(cfg.indicator_params.ema_fast, 9);
        assert_eq!(cfg.indicator_params.ema_slow, 50);
    }

    #[test]
    fn toggle_update_reports_only_real_changes() {
        let mut toggles = IndicatorToggles {
            ema: true,
            ..IndicatorToggles::default()
        };
        let update: IndicatorUpdate = serde_json::from_str(r#"{ "ema": true, "rsi": true }"#).unwrap();
        let changes = toggles.apply(update);
        assert_eq!(changes, vec!["rsi: false -> true".to_string()]);
        assert!(toggles.ema && toggles.rsi && !toggles.bollinger);

        assert!(toggles.apply(IndicatorUpdate::default()).is_empty());
    }

    #[test]
    fn unknown_timeframe_is_rejected() {
        assert!(serde_json::from_str::<ChartConfig>(r#"{ "timeframe": "1M" }"#).is_err());
    }

    #[test]
    fn ws_url_derived_from_api_scheme() {
        let mut cfg = ChartConfig::default();
        cfg.api_url = "https://api.example.com/".into();
        assert_eq!(cfg.resolved_ws_url(), "wss://api.example.com");
        cfg.api_url = "http://localhost:8000".into();
        assert_eq!(cfg.resolved_ws_url(), "ws://localhost:8000");
        cfg.ws_url = Some("ws://feed:9000/".into());
        assert_eq!(cfg.resolved_ws_url(), "ws://feed:9000");
    }

    #[test]
    fn env_overrides_apply_and_skip_invalid() {
        let vars: HashMap<&str, &str> = [
            ("CHART_SYMBOL", "XBT/USD"),
            ("CHART_TIMEFRAME", "bogus"),
            ("CHART_EXCHANGE", "  "),
            ("CHART_BIND_ADDR", "127.0.0.1:4000"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ChartConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.symbol, "XBT/USD");
        assert_eq!(cfg.timeframe, Timeframe::M5);
        assert_eq!(cfg.exchange, "kraken");
        assert_eq!(cfg.bind_addr, "127.0.0.1:4000");
    }

    #[test]
    fn roundtrip_through_disk() {
        let dir = std::env::temp_dir().join(format!("chart-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chart_config.json");

        let mut cfg = ChartConfig::default();
        cfg.symbol = "ETH/USD".into();
        cfg.indicators.bollinger = true;
        cfg.save(&path).unwrap();

        let loaded = ChartConfig::load(&path).unwrap();
        assert_eq!(loaded.symbol, "ETH/USD");
        assert!(loaded.indicators.bollinger);
        assert_eq!(loaded.initial_selection().symbol, "ETH/USD");

        std::fs::remove_dir_all(&dir).ok();
    }
}
