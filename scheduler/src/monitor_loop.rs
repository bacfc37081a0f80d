//! Body of the monitoring task.
//!
//! Per cycle:
//!   1. Kick off a background registry refresh when one is due.
//!   2. For every asset and timeframe, fetch history, resample if needed and
//!      run the crossover detector. Calls are sequential with a fixed pause
//!      after each upstream request.
//!   3. Sleep out the rest of the check interval in slices.
//!
//! Cancellation is checked at the loop head, between assets and timeframes,
//! and between sleep slices. An in-flight fetch is never interrupted.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use common::{TraceId, cycle_span, warn_if_slow};
use market::moving_average::resample;
use market::{Asset, AssetRegistry, MarketDataSource, MarketError, Timeframe};
use signals::{AlertEvent, AlertSink, CrossoverDetector, Decision};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::types::{DisplaySink, MonitorState, SchedulerConfig};

pub(crate) struct MonitorLoop<S> {
    cfg: SchedulerConfig,
    source: Arc<S>,
    registry: AssetRegistry,
    detector: CrossoverDetector,
    alerts: Arc<dyn AlertSink>,
    display: Arc<dyn DisplaySink>,
    token: CancellationToken,
}

impl<S: MarketDataSource + 'static> MonitorLoop<S> {
    pub(crate) fn new(
        cfg: SchedulerConfig,
        source: Arc<S>,
        registry: AssetRegistry,
        alerts: Arc<dyn AlertSink>,
        display: Arc<dyn DisplaySink>,
        token: CancellationToken,
    ) -> Self {
        // Fresh regime state for every run.
        let detector = CrossoverDetector::new(cfg.short_ma_period, cfg.long_ma_period);

        Self {
            cfg,
            source,
            registry,
            detector,
            alerts,
            display,
            token,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            interval_s = self.cfg.check_interval.as_secs(),
            timeframes = self.cfg.timeframes.len(),
            short = self.cfg.short_ma_period,
            long = self.cfg.long_ma_period,
            "monitoring loop started"
        );

        let mut next_refresh = Instant::now();
        let mut cycle: u64 = 0;

        while !self.token.is_cancelled() {
            let started = Instant::now();

            if started >= next_refresh {
                self.spawn_refresh();
                next_refresh = started + self.cfg.registry_refresh_every;
            }

            let assets = self.registry.snapshot();
            if assets.is_empty() {
                debug!("asset registry is empty; backing off");
                self.pause(self.cfg.empty_registry_backoff).await;
                continue;
            }

            cycle += 1;
            let span = cycle_span(cycle, &TraceId::new());
            span.record("assets", assets.len() as u64);

            self.run_pass(&assets).instrument(span).await;

            if self.token.is_cancelled() {
                break;
            }

            let remaining = self.cfg.check_interval.saturating_sub(started.elapsed());
            debug!(sleep_ms = remaining.as_millis() as u64, "cycle complete");
            self.pause(remaining).await;
        }

        info!(cycles = cycle, "monitoring loop stopped");
    }

    async fn run_pass(&mut self, assets: &[Asset]) {
        let timeframes = self.cfg.timeframes.clone();
        let mut emitted = 0usize;

        'assets: for asset in assets {
            for tf in &timeframes {
                if self.token.is_cancelled() {
                    debug!("cancellation requested; ending pass early");
                    break 'assets;
                }

                if let Some(event) = self.check(asset, tf).await {
                    self.emit(&event);
                    emitted += 1;
                }
            }
        }

        info!(assets = assets.len(), alerts = emitted, "crossover pass finished");
    }

    /// One asset on one timeframe. Every failure is logged and skipped.
    async fn check(&mut self, asset: &Asset, tf: &Timeframe) -> Option<AlertEvent> {
        let fetched = warn_if_slow(
            "fetch_close_history",
            self.cfg.slow_fetch_threshold,
            self.source
                .fetch_close_history(&asset.id, &self.cfg.quote_currency, tf.lookback_days),
        )
        .await;

        self.pause(self.cfg.request_delay).await;

        let series = match fetched {
            Ok(s) if s.is_empty() => {
                debug!(asset = %asset.id, timeframe = %tf, "empty history; skipping");
                return None;
            }
            Ok(s) => s,
            Err(e) => {
                warn!(asset = %asset.id, timeframe = %tf, error = %e, "history fetch failed; skipping");
                return None;
            }
        };

        let series = match tf.bucket_hours {
            Some(hours) => resample(&series, hours),
            None => series,
        };

        match self.detector.evaluate(asset, &tf.label, &series) {
            Ok(Decision::Alert(event)) => Some(event),
            Ok(decision) => {
                debug!(asset = %asset.id, timeframe = %tf, ?decision, "evaluated");
                None
            }
            Err(e @ MarketError::InsufficientData { .. }) => {
                debug!(asset = %asset.id, timeframe = %tf, error = %e, "skipping evaluation");
                None
            }
            Err(e) => {
                warn!(asset = %asset.id, timeframe = %tf, error = %e, "evaluation failed; skipping");
                None
            }
        }
    }

    fn emit(&self, event: &AlertEvent) {
        let alerts = &self.alerts;
        if catch_unwind(AssertUnwindSafe(|| alerts.on_alert(event))).is_err() {
            error!(alert_id = %event.alert_id, asset = %event.asset_id, "alert sink panicked; alert dropped");
        }
    }

    fn spawn_refresh(&self) {
        let registry = self.registry.clone();
        let source = Arc::clone(&self.source);
        let display = Arc::clone(&self.display);
        let limit = self.cfg.top_n_assets;
        let quote = self.cfg.quote_currency.clone();
        let token = self.token.clone();

        // Bound to the run: a refresh in flight at stop is dropped unpublished.
        tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => debug!("monitoring stopped; registry refresh abandoned"),
                    // Failures are logged by the registry; the old snapshot stays.
                    _ = refresh_registry(&registry, source.as_ref(), display.as_ref(), limit, &quote) => {}
                }
            }
            .instrument(tracing::info_span!("registry_refresh")),
        );
    }

    async fn pause(&self, total: Duration) -> bool {
        sleep_in_slices(total, self.cfg.sleep_slice, &self.token).await
    }
}

/// Refreshes `registry` and hands the new snapshot to `display`.
pub(crate) async fn refresh_registry<S>(
    registry: &AssetRegistry,
    source: &S,
    display: &dyn DisplaySink,
    limit: usize,
    quote_currency: &str,
) -> Result<Arc<Vec<Asset>>, MarketError>
where
    S: MarketDataSource + ?Sized,
{
    let assets = registry.refresh(source, limit, quote_currency).await?;

    if catch_unwind(AssertUnwindSafe(|| display.on_assets(&assets))).is_err() {
        error!("display sink panicked on asset refresh");
    }

    Ok(assets)
}

pub(crate) fn notify_state(display: &dyn DisplaySink, state: MonitorState) {
    if catch_unwind(AssertUnwindSafe(|| display.on_state(state))).is_err() {
        error!(%state, "display sink panicked on state change");
    }
}

/// Sleeps `total` in chunks of at most `slice`, returning early on cancellation.
///
/// Returns `true` when the full duration elapsed.
pub(crate) async fn sleep_in_slices(
    total: Duration,
    slice: Duration,
    token: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + total;
    let slice = slice.max(Duration::from_millis(1));

    loop {
        if token.is_cancelled() {
            return false;
        }

        let now = Instant::now();
        if now >= deadline {
            return true;
        }

        let step = slice.min(deadline - now);
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(step) => {}
        }
    }
}
