// =============================================================================
// Runtime Configuration — instrument, timing and indicator settings
// =============================================================================
//
// Every tunable of a run lives here. All fields carry a serde default so an
// empty or partial JSON file is valid, and a missing file simply means
// "run with defaults". A handful of environment variables override the file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::AnalysisWindows;
use crate::poller::PollSettings;
use crate::resolver::ResolutionPlan;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_feed_url() -> String {
    "wss://data.tradingview.com/socket.io/websocket?type=chart".to_string()
}

fn default_auth_token() -> String {
    "unauthorized_user_token".to_string()
}

fn default_primary_symbol() -> String {
    "NSE:NIFTY".to_string()
}

fn default_symbol_candidates() -> Vec<String> {
    vec![
        "NSE:NIFTY".to_string(),
        "INDEXNSE:NIFTY_50".to_string(),
        "NSE:NIFTY50".to_string(),
        "INDEXNSE:NIFTY".to_string(),
        "TVC:NIFTY".to_string(),
    ]
}

fn default_simple_candidates() -> Vec<String> {
    vec![
        "NSE:NIFTY".to_string(),
        "INDEXNSE:NIFTY_50".to_string(),
        "NSE:NIFTY50".to_string(),
    ]
}

fn default_timeframe() -> String {
    "1H".to_string()
}

fn default_instrument_type() -> String {
    "index".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_resolve_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_min_bars() -> usize {
    1
}

fn default_simple_wait_ms() -> u64 {
    5000
}

fn default_bar_range() -> u32 {
    300
}

fn default_short_window() -> usize {
    10
}

fn default_long_window() -> usize {
    50
}

fn default_position_window() -> usize {
    20
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Settings for one run of the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Feed ----------------------------------------------------------------

    /// Websocket endpoint of the chart feed.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Token sent with `set_auth_token`; the anonymous token gives delayed data.
    #[serde(default = "default_auth_token")]
    pub auth_token: String,

    // --- Instrument ----------------------------------------------------------

    /// Symbol used by the reduced subscription shapes and in logs.
    #[serde(default = "default_primary_symbol")]
    pub primary_symbol: String,

    /// Spellings tried in order by the primary flow.
    #[serde(default = "default_symbol_candidates")]
    pub symbol_candidates: Vec<String>,

    /// Spellings tried in order by the simple (fallback) flow.
    #[serde(default = "default_simple_candidates")]
    pub simple_candidates: Vec<String>,

    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    /// Instrument-type hint for the options-object subscription shape.
    #[serde(default = "default_instrument_type")]
    pub instrument_type: String,

    /// Number of historical bars requested when a series is created.
    #[serde(default = "default_bar_range")]
    pub bar_range: u32,

    // --- Timing --------------------------------------------------------------

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How long a qualified `set_market` waits for the feed to resolve the symbol.
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// Single fixed wait used by the simple flow instead of polling.
    #[serde(default = "default_simple_wait_ms")]
    pub simple_wait_ms: u64,

    // --- Indicators ----------------------------------------------------------

    #[serde(default = "default_short_window")]
    pub short_window: usize,

    #[serde(default = "default_long_window")]
    pub long_window: usize,

    #[serde(default = "default_position_window")]
    pub position_window: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            auth_token: default_auth_token(),
            primary_symbol: default_primary_symbol(),
            symbol_candidates: default_symbol_candidates(),
            simple_candidates: default_simple_candidates(),
            timeframe: default_timeframe(),
            instrument_type: default_instrument_type(),
            bar_range: default_bar_range(),
            connect_timeout_secs: default_connect_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            min_bars: default_min_bars(),
            simple_wait_ms: default_simple_wait_ms(),
            short_window: default_short_window(),
            long_window: default_long_window(),
            position_window: default_position_window(),
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
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            primary = %config.primary_symbol,
            timeframe = %config.timeframe,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from a variable lookup (`std::env::var` in production).
    ///
    /// * `TVBOT_SYMBOLS`   : comma-separated candidates; the first becomes primary.
    /// * `TVBOT_TIMEFRAME` : timeframe string.
    /// * `TVBOT_AUTH_TOKEN`: feed auth token.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(syms) = lookup("TVBOT_SYMBOLS") {
            let candidates: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if let Some(first) = candidates.first() {
                self.primary_symbol = first.clone();
                self.symbol_candidates = candidates;
            }
        }
        if let Some(tf) = lookup("TVBOT_TIMEFRAME").filter(|s| !s.trim().is_empty()) {
            self.timeframe = tf.trim().to_string();
        }
        if let Some(token) = lookup("TVBOT_AUTH_TOKEN").filter(|s| !s.is_empty()) {
            self.auth_token = token;
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn simple_wait(&self) -> Duration {
        Duration::from_millis(self.simple_wait_ms)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            min_bars: self.min_bars,
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn windows(&self) -> AnalysisWindows {
        AnalysisWindows {
            short: self.short_window,
            long: self.long_window,
            position: self.position_window,
        }
    }

    pub fn resolution_plan(&self) -> ResolutionPlan {
        ResolutionPlan {
            candidates: self.symbol_candidates.clone(),
            primary: self.primary_symbol.clone(),
            timeframe: self.timeframe.clone(),
            instrument_type: self.instrument_type.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.primary_symbol, "NSE:NIFTY");
        assert_eq!(cfg.symbol_candidates.len(), 5);
        assert_eq!(cfg.symbol_candidates[0], "NSE:NIFTY");
        assert_eq!(cfg.symbol_candidates[4], "TVC:NIFTY");
        assert_eq!(cfg.simple_candidates.len(), 3);
        assert_eq!(cfg.timeframe, "1H");
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.poll_settings(), PollSettings::default());
        assert_eq!(cfg.windows(), AnalysisWindows::default());
        assert_eq!(cfg.simple_wait(), Duration::from_secs(5));
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.primary_symbol, "NSE:NIFTY");
        assert_eq!(cfg.max_poll_attempts, 10);
        assert_eq!(cfg.auth_token, "unauthorized_user_token");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "timeframe": "15", "symbol_candidates": ["BINANCE:BTCUSDT"] }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.timeframe, "15");
        assert_eq!(cfg.symbol_candidates, vec!["BINANCE:BTCUSDT"]);
        assert_eq!(cfg.long_window, 50);
        assert_eq!(cfg.min_bars, 1);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/definitely/not/here.json").is_err());
    }

    #[test]
    fn symbol_override_replaces_candidates_and_primary() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(lookup_from(&[("TVBOT_SYMBOLS", " nse:banknifty , ,TVC:DJI ")]));
        assert_eq!(cfg.primary_symbol, "NSE:BANKNIFTY");
        assert_eq!(cfg.symbol_candidates, vec!["NSE:BANKNIFTY", "TVC:DJI"]);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(lookup_from(&[
            ("TVBOT_SYMBOLS", " , "),
            ("TVBOT_TIMEFRAME", "  "),
            ("TVBOT_AUTH_TOKEN", ""),
        ]));
        assert_eq!(cfg.primary_symbol, "NSE:NIFTY");
        assert_eq!(cfg.timeframe, "1H");
        assert_eq!(cfg.auth_token, "unauthorized_user_token");
    }

    #[test]
    fn resolution_plan_mirrors_config() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(lookup_from(&[("TVBOT_TIMEFRAME", "4H")]));
        let plan = cfg.resolution_plan();
        assert_eq!(plan.timeframe, "4H");
        assert_eq!(plan.primary, "NSE:NIFTY");
        assert_eq!(plan.instrument_type, "index");
        assert_eq!(plan.candidates, cfg.symbol_candidates);
    }
}
