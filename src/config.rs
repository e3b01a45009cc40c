use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::strategy::{LastPriceSeed, SignalConfig};

pub const KRAKEN_API_URL: &str = "https://api.kraken.com";
const DEFAULT_CONFIG_FILE: &str = "cryptopilot";
const ENV_PREFIX: &str = "CRYPTOPILOT";

/// Candle intervals (minutes) accepted by Kraken's OHLC endpoint
pub const KRAKEN_INTERVALS: &[u32] = &[1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

/// Runtime settings, loaded once at startup and never mutated
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    // API credentials
    pub api_key: String,
    pub api_secret: String,
    pub api_url: String,
    pub request_timeout_secs: u64,

    // Trading pair and currency
    pub pair: String,
    pub currency: String,

    // Trading parameters
    pub trade_size: f64, // in lots
    pub wait_time_secs: u64,
    pub query_open_orders: bool,

    // Technical analysis parameters
    pub interval: u32,          // in minutes
    pub lookback_period: usize, // in intervals
    pub bbands_period: usize,   // in intervals
    pub bbands_dev_up: f64,
    pub bbands_dev_down: f64,
    pub fib_levels: Vec<f64>,
    pub sell_level: f64,
    pub buy_level: f64,
    pub last_price_seed: LastPriceSeed,
}

impl Default for Settings {
    fn default() -> Self {
        let signals = SignalConfig::default();
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            api_url: KRAKEN_API_URL.to_string(),
            request_timeout_secs: 30,
            // Altname; OHLC may key results as XXBTZUSD instead
            pair: "XBTUSD".to_string(),
            currency: "XBT".to_string(),
            trade_size: 0.01,
            wait_time_secs: 60,
            query_open_orders: false,
            interval: 15,
            lookback_period: signals.lookback_period,
            bbands_period: signals.bbands_period,
            bbands_dev_up: signals.bbands_dev_up,
            bbands_dev_down: signals.bbands_dev_down,
            fib_levels: signals.fib_levels,
            sell_level: signals.sell_level,
            buy_level: signals.buy_level,
            last_price_seed: signals.last_price_seed,
        }
    }
}

// Keeps the secret out of logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("api_url", &self.api_url)
            .field("pair", &self.pair)
            .field("currency", &self.currency)
            .field("trade_size", &self.trade_size)
            .field("wait_time_secs", &self.wait_time_secs)
            .field("interval", &self.interval)
            .field("lookback_period", &self.lookback_period)
            .field("bbands_period", &self.bbands_period)
            .field("fib_levels", &self.fib_levels)
            .finish_non_exhaustive()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Settings {
    /// Load settings from `path` (or `cryptopilot.*` in the working directory
    /// if present), then `CRYPTOPILOT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("fib_levels"),
        );

        Self::from_builder(builder)
    }

    /// Parse settings from a TOML document, defaults filling the gaps
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            KRAKEN_INTERVALS.contains(&self.interval),
            "interval {} is not supported by Kraken (expected one of {:?})",
            self.interval,
            KRAKEN_INTERVALS
        );
        anyhow::ensure!(
            self.bbands_period >= 2,
            "bbands_period must be at least 2, got {}",
            self.bbands_period
        );
        anyhow::ensure!(!self.fib_levels.is_empty(), "fib_levels must not be empty");

        for (name, level) in [("sell_level", self.sell_level), ("buy_level", self.buy_level)] {
            anyhow::ensure!(
                self.fib_levels.iter().any(|l| (l - level).abs() <= 1e-9),
                "{} {} is not one of fib_levels {:?}",
                name,
                level,
                self.fib_levels
            );
        }

        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            lookback_period: self.lookback_period,
            bbands_period: self.bbands_period,
            bbands_dev_up: self.bbands_dev_up,
            bbands_dev_down: self.bbands_dev_down,
            fib_levels: self.fib_levels.clone(),
            sell_level: self.sell_level,
            buy_level: self.buy_level,
            last_price_seed: self.last_price_seed,
        }
    }
}
