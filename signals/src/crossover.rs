//! Moving average crossover detection with per-series regime deduplication.
//!
//! Each evaluation looks at the last two MA samples of a series and commits
//! at most one regime update for its `AlertKey`. Priority:
//!
//! 1. golden cross  (`prev_short <= prev_long && cur_short > cur_long`)
//! 2. death cross   (`prev_short >= prev_long && cur_short < cur_long`)
//! 3. silent sync to the observed regime, no emission
//!
//! A cross only emits when the stored regime differs from the one it enters.
//! Equal averages never emit and never touch state.

use chrono::{DateTime, Utc};
use market::moving_average::moving_average_samples;
use market::{Asset, MarketError, TimeSeries};
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::AlertStateStore;
use crate::types::{AlertEvent, AlertKey, CrossKind, Regime};

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// A crossover into a regime not yet recorded for the key.
    Alert(AlertEvent),
    /// A crossover whose regime was already recorded.
    Suppressed(CrossKind),
    /// No crossover; stored regime set to the observed one.
    Synced(Regime),
    /// Equal or undefined averages; state untouched.
    NoDecision,
}

pub struct CrossoverDetector {
    short_period: usize,
    long_period: usize,
    state: AlertStateStore,
}

impl CrossoverDetector {
    /// # Panics
    /// Unless `0 < short_period < long_period`.
    pub fn new(short_period: usize, long_period: usize) -> Self {
        assert!(short_period > 0, "short_period must be > 0");
        assert!(
            long_period > short_period,
            "long_period must be > short_period"
        );

        Self {
            short_period,
            long_period,
            state: AlertStateStore::new(),
        }
    }

    pub fn short_period(&self) -> usize {
        self.short_period
    }

    pub fn long_period(&self) -> usize {
        self.long_period
    }

    /// Minimum series length for a decision: two defined long-MA samples.
    pub fn required_len(&self) -> usize {
        self.long_period + 1
    }

    pub fn state(&self) -> &AlertStateStore {
        &self.state
    }

    pub fn regime(&self, key: &AlertKey) -> Option<Regime> {
        self.state.get(key)
    }

    /// Classifies the tail of `series` for `asset` on `timeframe`.
    ///
    /// Returns `InsufficientData` without mutating state when the series is
    /// shorter than [`required_len`](Self::required_len).
    pub fn evaluate(
        &mut self,
        asset: &Asset,
        timeframe: &str,
        series: &TimeSeries,
    ) -> Result<Decision, MarketError> {
        let required = self.required_len();
        if series.len() < required {
            return Err(MarketError::InsufficientData {
                len: series.len(),
                required,
            });
        }

        let samples = moving_average_samples(series, self.short_period, self.long_period);
        let [.., prev, cur] = samples.as_slice() else {
            return Ok(Decision::NoDecision);
        };

        let (Some(prev_short), Some(prev_long), Some(cur_short), Some(cur_long)) =
            (prev.short, prev.long, cur.short, cur.long)
        else {
            return Ok(Decision::NoDecision);
        };

        let key = AlertKey::new(&asset.id, timeframe);

        let crossed = if prev_short <= prev_long && cur_short > cur_long {
            Some(CrossKind::Golden)
        } else if prev_short >= prev_long && cur_short < cur_long {
            Some(CrossKind::Death)
        } else {
            None
        };

        let Some(kind) = crossed else {
            return Ok(match Regime::classify(cur_short, cur_long) {
                Some(regime) => {
                    self.state.set(key, regime);
                    Decision::Synced(regime)
                }
                None => Decision::NoDecision,
            });
        };

        if self.state.get(&key) == Some(kind.regime()) {
            debug!(
                asset = %asset.id,
                timeframe,
                kind = %kind,
                "crossover already recorded; suppressed"
            );
            return Ok(Decision::Suppressed(kind));
        }

        self.state.set(key, kind.regime());

        let trigger_price = series.last().map(|p| p.close).unwrap_or(cur_short);
        let event = self.build_event(asset, timeframe, kind, trigger_price, cur_short, cur_long, cur.ts);

        info!(
            asset = %asset.id,
            timeframe,
            kind = %kind,
            short_ma = cur_short,
            long_ma = cur_long,
            "crossover detected"
        );

        Ok(Decision::Alert(event))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_event(
        &self,
        asset: &Asset,
        timeframe: &str,
        kind: CrossKind,
        trigger_price: f64,
        short_ma: f64,
        long_ma: f64,
        ts: DateTime<Utc>,
    ) -> AlertEvent {
        AlertEvent {
            alert_id: Uuid::new_v4(),
            asset_id: asset.id.clone(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            timeframe: timeframe.to_string(),
            kind,
            trigger_price,
            short_period: self.short_period,
            long_period: self.long_period,
            short_ma,
            long_ma,
            ts,
        }
    }
}
