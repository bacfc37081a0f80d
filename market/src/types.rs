use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked asset from a registry snapshot.
///
/// Snapshots are immutable; a refresh replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Provider key, e.g. `bitcoin`. Stable across refreshes.
    pub id: String,
    pub symbol: String,
    pub name: String,

    /// 1-based position in the ranked list.
    pub rank: u32,

    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,

    /// Change since 00:00 UTC.
    pub change_utc_day_pct: Option<f64>,
}

impl Asset {
    /// `Bitcoin (BTC)`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.symbol.to_uppercase())
    }
}

/// A single candle. Close-only sources synthesize open/high/low from close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl TimeSeriesPoint {
    pub fn from_close(ts: DateTime<Utc>, close: f64) -> Self {
        Self {
            ts,
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Chronologically ordered candles for one asset and timeframe.
///
/// Timestamps are strictly increasing. Construction sorts the input, keeps the
/// last point seen for a duplicated timestamp and drops non-finite values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    pub fn new(points: impl IntoIterator<Item = TimeSeriesPoint>) -> Self {
        let by_ts: BTreeMap<DateTime<Utc>, TimeSeriesPoint> = points
            .into_iter()
            .filter(TimeSeriesPoint::is_finite)
            .map(|p| (p.ts, p))
            .collect();

        Self {
            points: by_ts.into_values().collect(),
        }
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&TimeSeriesPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Bucket granularity over which closes are aggregated before computing MAs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    /// Label used in alert keys and messages (`1H`, `4H`).
    pub label: String,

    /// Days of close history requested per evaluation.
    pub lookback_days: u32,

    /// `None` uses the provider's native granularity.
    pub bucket_hours: Option<u32>,
}

impl Timeframe {
    pub fn native(label: impl Into<String>, lookback_days: u32) -> Self {
        Self {
            label: label.into(),
            lookback_days,
            bucket_hours: None,
        }
    }

    pub fn resampled(label: impl Into<String>, lookback_days: u32, bucket_hours: u32) -> Self {
        Self {
            label: label.into(),
            lookback_days,
            bucket_hours: Some(bucket_hours),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Short and long moving average at one series timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageSample {
    pub ts: DateTime<Utc>,
    pub short: Option<f64>,
    pub long: Option<f64>,
}
