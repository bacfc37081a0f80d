use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Qualitative relation between the short and the long moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// short > long
    Bullish,
    /// short < long
    Bearish,
}

impl Regime {
    /// `None` when the averages are equal.
    pub fn classify(short: f64, long: f64) -> Option<Self> {
        if short > long {
            Some(Regime::Bullish)
        } else if short < long {
            Some(Regime::Bearish)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossKind {
    Golden,
    Death,
}

impl CrossKind {
    /// Regime entered by this crossover.
    pub fn regime(self) -> Regime {
        match self {
            CrossKind::Golden => Regime::Bullish,
            CrossKind::Death => Regime::Bearish,
        }
    }
}

impl fmt::Display for CrossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossKind::Golden => f.write_str("golden cross"),
            CrossKind::Death => f.write_str("death cross"),
        }
    }
}

/// One tracked series: an asset on a timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub asset_id: String,
    pub timeframe: String,
}

impl AlertKey {
    pub fn new(asset_id: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            timeframe: timeframe.into(),
        }
    }
}

/// Emitted once per detected regime transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: Uuid,
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub timeframe: String,
    pub kind: CrossKind,

    /// Last close of the evaluated series.
    pub trigger_price: f64,

    pub short_period: usize,
    pub long_period: usize,
    pub short_ma: f64,
    pub long_ma: f64,

    /// Timestamp of the sample on which the cross was observed.
    pub ts: DateTime<Utc>,
}

impl AlertEvent {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(&self.asset_id, &self.timeframe)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.kind {
            CrossKind::Golden => "above",
            CrossKind::Death => "below",
        };

        writeln!(f, "Asset: {} ({})", self.name, self.symbol.to_uppercase())?;
        writeln!(f, "Timeframe: {}", self.timeframe)?;
        writeln!(
            f,
            "Type: {} (MA{} {} MA{})",
            self.kind, self.short_period, direction, self.long_period
        )?;
        writeln!(f, "Trigger price: ${:.4}", self.trigger_price)?;
        writeln!(f, "MA{}: {:.4}", self.short_period, self.short_ma)?;
        write!(f, "MA{}: {:.4}", self.long_period, self.long_ma)
    }
}
