use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use market::Timeframe;
use scheduler::SchedulerConfig;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    Parse { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings, loaded once at startup.
///
/// Every field has a default, so a partial file is valid. The key names of
/// older `config.json` files are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of top assets by market cap to monitor.
    #[serde(alias = "top_n_coins", deserialize_with = "int")]
    pub top_n_assets: usize,

    #[serde(alias = "vs_currency")]
    pub quote_currency: String,

    #[serde(deserialize_with = "int")]
    pub short_ma_period: usize,
    #[serde(deserialize_with = "int")]
    pub long_ma_period: usize,

    /// Days of hourly history behind the 1H timeframe.
    #[serde(alias = "days_for_1h_data_ma", deserialize_with = "int")]
    pub lookback_days_short_timeframe: u32,

    /// Days of hourly history resampled into the 4H timeframe.
    #[serde(alias = "days_for_4h_data_base_ma", deserialize_with = "int")]
    pub lookback_days_long_timeframe: u32,

    #[serde(alias = "days_for_1h_chart", deserialize_with = "int")]
    pub chart_days_short_timeframe: u32,

    #[serde(alias = "days_for_4h_chart", deserialize_with = "int")]
    pub chart_days_long_timeframe: u32,

    #[serde(deserialize_with = "int")]
    pub check_interval_seconds: u64,

    /// Defaults to `check_interval_seconds`.
    #[serde(deserialize_with = "optional_int")]
    pub registry_refresh_seconds: Option<u64>,

    /// Pause after each history request (provider rate limit).
    #[serde(deserialize_with = "int")]
    pub request_delay_ms: u64,

    #[serde(deserialize_with = "int")]
    pub sleep_slice_ms: u64,
    #[serde(deserialize_with = "int")]
    pub stop_timeout_seconds: u64,
    #[serde(deserialize_with = "int")]
    pub http_timeout_seconds: u64,
    pub api_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            top_n_assets: 100,
            quote_currency: "usd".to_string(),
            short_ma_period: 5,
            long_ma_period: 20,
            lookback_days_short_timeframe: 3,
            lookback_days_long_timeframe: 10,
            chart_days_short_timeframe: 2,
            chart_days_long_timeframe: 14,
            check_interval_seconds: 300,
            registry_refresh_seconds: None,
            request_delay_ms: 1_000,
            sleep_slice_ms: 1_000,
            stop_timeout_seconds: 7,
            http_timeout_seconds: 15,
            api_base_url: market::coingecko::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, applies environment overrides and validates.
    ///
    /// A missing file is created with the defaults. A malformed file is
    /// reported and replaced by the defaults for this run.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = match std::fs::read_to_string(path) {
            Ok(body) => match Self::from_json(&body) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config file is malformed; using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let cfg = Self::default();
                match cfg.write(path) {
                    Ok(()) => info!(path = %path.display(), "config file not found; wrote defaults"),
                    Err(e) => warn!(error = %e, "config file not found and defaults could not be written"),
                }
                cfg
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let cfg = cfg.with_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a config body. When a legacy key and its replacement are both
    /// present the replacement wins.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;

        if let Some(map) = value.as_object_mut() {
            for (legacy, key) in LEGACY_KEYS {
                if map.contains_key(key) && map.remove(legacy).is_some() {
                    warn!(legacy, key, "config sets both a legacy key and its replacement; ignoring the legacy key");
                }
            }
        }

        serde_json::from_value(value)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, body).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `MONITOR_*` / `COINGECKO_API_URL` values returned by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MONITOR_QUOTE_CURRENCY") {
            self.quote_currency = v.trim().to_lowercase();
        }
        if let Some(v) = lookup("MONITOR_TOP_N_ASSETS") {
            self.top_n_assets = parse("MONITOR_TOP_N_ASSETS", &v)?;
        }
        if let Some(v) = lookup("MONITOR_CHECK_INTERVAL_SECONDS") {
            self.check_interval_seconds = parse("MONITOR_CHECK_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = lookup("COINGECKO_API_URL") {
            self.api_base_url = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_ma_period == 0 {
            return Err(ConfigError::Invalid("short_ma_period must be > 0".into()));
        }
        if self.long_ma_period <= self.short_ma_period {
            return Err(ConfigError::Invalid(format!(
                "long_ma_period ({}) must be greater than short_ma_period ({})",
                self.long_ma_period, self.short_ma_period
            )));
        }
        if self.top_n_assets == 0 {
            return Err(ConfigError::Invalid("top_n_assets must be > 0".into()));
        }
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::Invalid("check_interval_seconds must be > 0".into()));
        }
        if self.lookback_days_short_timeframe == 0 || self.lookback_days_long_timeframe == 0 {
            return Err(ConfigError::Invalid("lookback days must be > 0".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let check_interval = Duration::from_secs(self.check_interval_seconds);

        SchedulerConfig {
            top_n_assets: self.top_n_assets,
            quote_currency: self.quote_currency.clone(),
            short_ma_period: self.short_ma_period,
            long_ma_period: self.long_ma_period,
            timeframes: vec![
                Timeframe::native("1H", self.lookback_days_short_timeframe),
                Timeframe::resampled("4H", self.lookback_days_long_timeframe, 4),
            ],
            check_interval,
            registry_refresh_every: self
                .registry_refresh_seconds
                .map(Duration::from_secs)
                .unwrap_or(check_interval),
            request_delay: Duration::from_millis(self.request_delay_ms),
            sleep_slice: Duration::from_millis(self.sleep_slice_ms),
            stop_timeout: Duration::from_secs(self.stop_timeout_seconds),
            ..SchedulerConfig::default()
        }
    }
}

const LEGACY_KEYS: [(&str, &str); 6] = [
    ("top_n_coins", "top_n_assets"),
    ("vs_currency", "quote_currency"),
    ("days_for_1h_data_ma", "lookback_days_short_timeframe"),
    ("days_for_4h_data_base_ma", "lookback_days_long_timeframe"),
    ("days_for_1h_chart", "chart_days_short_timeframe"),
    ("days_for_4h_chart", "chart_days_long_timeframe"),
];

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        key,
        value: value.to_string(),
    })
}

/// Integers may be written as JSON numbers or as strings (`"14"`), as older
/// files did.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

impl NumOrStr {
    fn into_int<T, E>(self) -> Result<T, E>
    where
        T: TryFrom<u64> + std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
        E: serde::de::Error,
    {
        match self {
            NumOrStr::Num(n) => T::try_from(n).map_err(|_| E::custom(format!("{n} is out of range"))),
            NumOrStr::Str(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn int<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    NumOrStr::deserialize(d)?.into_int()
}

fn optional_int<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumOrStr>::deserialize(d)?
        .map(|v| v.into_int::<u64, D::Error>())
        .transpose()
}
