//! Shared types used by the monitoring scheduler.

use std::fmt;
use std::time::Duration;

use market::{Asset, Timeframe};

/// Configuration knobs for the monitoring loop.
///
/// Loaded once at startup; a running loop never observes changes.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Size of the ranked asset list pulled on each registry refresh.
    pub top_n_assets: usize,

    /// Quote currency for prices and history, e.g. `usd`.
    pub quote_currency: String,

    pub short_ma_period: usize,
    pub long_ma_period: usize,

    /// Evaluated for every asset, in order, on every pass.
    pub timeframes: Vec<Timeframe>,

    /// Target duration of one cycle (pass + sleep).
    pub check_interval: Duration,

    /// How often the registry is refreshed in the background.
    pub registry_refresh_every: Duration,

    /// Pause after every upstream history call.
    pub request_delay: Duration,

    /// Granularity of the inter-cycle sleep; bounds shutdown latency.
    pub sleep_slice: Duration,

    /// Back-off when the registry snapshot is empty.
    pub empty_registry_backoff: Duration,

    /// How long `stop()` waits for the loop to exit.
    pub stop_timeout: Duration,

    /// History fetches slower than this are logged.
    pub slow_fetch_threshold: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            top_n_assets: 100,
            quote_currency: "usd".to_string(),
            short_ma_period: 5,
            long_ma_period: 20,
            timeframes: vec![
                Timeframe::native("1H", 3),
                Timeframe::resampled("4H", 10, 4),
            ],
            check_interval: Duration::from_secs(300),
            registry_refresh_every: Duration::from_secs(300),
            request_delay: Duration::from_secs(1),
            sleep_slice: Duration::from_secs(1),
            empty_registry_backoff: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(7),
            slow_fetch_threshold: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of a [`MonitorScheduler`](crate::MonitorScheduler).
///
/// `Idle -> Running -> Stopping -> Stopped`, and `Stopped -> Running` on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorState::Idle => "idle",
            MonitorState::Running => "running",
            MonitorState::Stopping => "stopping",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// A previous loop has not exited yet.
    StillStopping,
}

/// Observer for registry refreshes and lifecycle transitions.
///
/// Invoked from background tasks; implementors synchronize their own state.
pub trait DisplaySink: Send + Sync {
    fn on_assets(&self, assets: &[Asset]);

    fn on_state(&self, _state: MonitorState) {}
}

/// Display sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDisplay;

impl DisplaySink for NoopDisplay {
    fn on_assets(&self, _assets: &[Asset]) {}
}
