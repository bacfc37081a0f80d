//! Lifecycle owner of the monitoring loop.
//!
//! `start()` spawns the loop as a tokio task bound to a fresh
//! `CancellationToken`; `stop()` cancels it and joins with a bounded timeout.
//! Lifecycle transitions are published on a `watch` channel and to the
//! display sink.

use std::sync::Arc;

use market::{Asset, AssetRegistry, MarketDataSource, MarketError};
use parking_lot::Mutex;
use signals::AlertSink;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::monitor_loop::{MonitorLoop, notify_state, refresh_registry};
use crate::types::{DisplaySink, MonitorState, SchedulerConfig, StartOutcome};

struct RunHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

pub struct MonitorScheduler<S> {
    cfg: SchedulerConfig,
    source: Arc<S>,
    registry: AssetRegistry,
    alerts: Arc<dyn AlertSink>,
    display: Arc<dyn DisplaySink>,
    state: Arc<watch::Sender<MonitorState>>,
    run: Mutex<Option<RunHandle>>,
}

impl<S: MarketDataSource + 'static> MonitorScheduler<S> {
    pub fn new(
        cfg: SchedulerConfig,
        source: Arc<S>,
        registry: AssetRegistry,
        alerts: Arc<dyn AlertSink>,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        let (state, _) = watch::channel(MonitorState::Idle);

        Self {
            cfg,
            source,
            registry,
            alerts,
            display,
            state: Arc::new(state),
            run: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Receiver that observes every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Refreshes the registry now, outside the loop's schedule.
    pub async fn refresh_now(&self) -> Result<Arc<Vec<Asset>>, MarketError> {
        refresh_registry(
            &self.registry,
            self.source.as_ref(),
            self.display.as_ref(),
            self.cfg.top_n_assets,
            &self.cfg.quote_currency,
        )
        .await
    }

    /// Launches the monitoring loop. Must be called inside a tokio runtime.
    ///
    /// No-op while a loop is running or still winding down.
    pub fn start(&self) -> StartOutcome {
        let mut outcome = StartOutcome::Started;

        self.state.send_if_modified(|s| match s {
            MonitorState::Running => {
                outcome = StartOutcome::AlreadyRunning;
                false
            }
            MonitorState::Stopping => {
                outcome = StartOutcome::StillStopping;
                false
            }
            MonitorState::Idle | MonitorState::Stopped => {
                *s = MonitorState::Running;
                true
            }
        });

        if outcome != StartOutcome::Started {
            debug!(?outcome, "start ignored");
            return outcome;
        }

        notify_state(self.display.as_ref(), MonitorState::Running);

        let token = CancellationToken::new();
        let worker = MonitorLoop::new(
            self.cfg.clone(),
            Arc::clone(&self.source),
            self.registry.clone(),
            Arc::clone(&self.alerts),
            Arc::clone(&self.display),
            token.clone(),
        );

        let state = Arc::clone(&self.state);
        let display = Arc::clone(&self.display);

        let join = tokio::spawn(
            async move {
                worker.run().await;
                state.send_replace(MonitorState::Stopped);
                notify_state(display.as_ref(), MonitorState::Stopped);
            }
            .instrument(tracing::info_span!("monitor_loop")),
        );

        *self.run.lock() = Some(RunHandle { token, join });

        info!("monitoring started");
        outcome
    }

    /// Requests cooperative cancellation and waits up to `stop_timeout` for the
    /// loop to exit.
    ///
    /// Returns `false` when the timeout elapsed first; the loop is then left to
    /// finish on its own and reports `Stopped` when it does. Calling `stop()`
    /// again while it winds down waits for that report under the same timeout.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> bool {
        let handle = self.run.lock().take();
        let Some(RunHandle { token, join }) = handle else {
            if self.state() == MonitorState::Stopping {
                debug!("stop requested while a detached loop winds down");
                return self.wait_stopped().await;
            }
            debug!("stop requested but no loop is running");
            return true;
        };

        // Publish Stopping before cancelling so the loop's own Stopped wins.
        let stopping = self.state.send_if_modified(|s| {
            if *s == MonitorState::Running {
                *s = MonitorState::Stopping;
                true
            } else {
                false
            }
        });
        if stopping {
            notify_state(self.display.as_ref(), MonitorState::Stopping);
        }

        token.cancel();

        match tokio::time::timeout(self.cfg.stop_timeout, join).await {
            Ok(Ok(())) => {
                info!("monitoring stopped");
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "monitoring task ended abnormally");
                self.state.send_replace(MonitorState::Stopped);
                notify_state(self.display.as_ref(), MonitorState::Stopped);
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.cfg.stop_timeout.as_millis() as u64,
                    "monitoring loop did not exit in time; detaching"
                );
                false
            }
        }
    }

    async fn wait_stopped(&self) -> bool {
        let mut rx = self.state.subscribe();
        let stopped = tokio::time::timeout(self.cfg.stop_timeout, async {
            rx.wait_for(|s| *s == MonitorState::Stopped).await.is_ok()
        })
        .await;

        if !matches!(stopped, Ok(true)) {
            warn!(
                timeout_ms = self.cfg.stop_timeout.as_millis() as u64,
                "monitoring loop still winding down"
            );
            return false;
        }
        true
    }
}

impl<S> Drop for MonitorScheduler<S> {
    fn drop(&mut self) {
        if let Some(h) = self.run.get_mut().take() {
            h.token.cancel();
        }
    }
}
