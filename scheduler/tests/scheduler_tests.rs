
use std::sync::Arc;
use std::time::{Duration, Instant};

use collecting_sink::{CollectingSink, RecordingDisplay};
use market::{AssetRegistry, MarketError, Timeframe};
use mock_source::{MockSource, golden_cross, hourly};
use scheduler::{MonitorScheduler, MonitorState, NoopDisplay, SchedulerConfig, StartOutcome};
use signals::{AlertEvent, AlertSink, CrossKind};

fn fast_cfg() -> SchedulerConfig {
    SchedulerConfig {
        top_n_assets: 10,
        quote_currency: "usd".into(),
        short_ma_period: 2,
        long_ma_period: 3,
        timeframes: vec![Timeframe::native("1H", 3)],
        check_interval: Duration::from_millis(50),
        registry_refresh_every: Duration::from_secs(60),
        request_delay: Duration::ZERO,
        sleep_slice: Duration::from_millis(10),
        empty_registry_backoff: Duration::from_millis(10),
        stop_timeout: Duration::from_secs(2),
        slow_fetch_threshold: Duration::from_secs(5),
    }
}

fn scheduler(
    cfg: SchedulerConfig,
    source: &MockSource,
    sink: &CollectingSink,
) -> MonitorScheduler<MockSource> {
    MonitorScheduler::new(
        cfg,
        Arc::new(source.clone()),
        AssetRegistry::new(),
        Arc::new(sink.clone()),
        Arc::new(NoopDisplay),
    )
}

async fn wait_for(mut cond: impl FnMut() -> bool, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

#[tokio::test]
async fn golden_cross_is_alerted_once_across_cycles() {
    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(fast_cfg(), &source, &sink);

    s.refresh_now().await.unwrap();
    assert_eq!(s.start(), StartOutcome::Started);

    assert!(wait_for(|| source.calls_for("bitcoin") >= 4, Duration::from_secs(3)).await);
    assert!(s.stop().await);

    let events = sink.events.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, CrossKind::Golden);
    assert_eq!(events[0].asset_id, "bitcoin");
    assert_eq!(events[0].timeframe, "1H");
    assert_eq!(s.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn failing_units_are_skipped_and_retried() {
    let source = MockSource::new()
        .with_asset("ethereum", Err(MarketError::Network("connection reset".into())))
        .with_asset("solana", Ok(hourly(&[1.0, 2.0])))
        .with_asset("cardano", Err(MarketError::DataFormat("bad body".into())))
        .with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(fast_cfg(), &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();

    assert!(wait_for(|| source.calls_for("ethereum") >= 3, Duration::from_secs(3)).await);
    assert_eq!(s.state(), MonitorState::Running);
    assert!(s.stop().await);

    let events = sink.events.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].asset_id, "bitcoin");
    assert!(source.calls_for("solana") >= 2);
}

#[tokio::test]
async fn every_timeframe_is_tracked_separately() {
    let mut cfg = fast_cfg();
    cfg.timeframes = vec![Timeframe::native("1H", 3), Timeframe::resampled("4H", 10, 1)];

    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();

    assert!(wait_for(|| sink.len() >= 2, Duration::from_secs(3)).await);
    assert!(s.stop().await);

    let mut frames: Vec<String> = sink.events.lock().iter().map(|e| e.timeframe.clone()).collect();
    frames.sort();
    assert_eq!(frames, vec!["1H".to_string(), "4H".to_string()]);
}

#[tokio::test]
async fn start_is_idempotent_and_restartable() {
    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(fast_cfg(), &source, &sink);

    assert_eq!(s.state(), MonitorState::Idle);
    s.refresh_now().await.unwrap();

    assert_eq!(s.start(), StartOutcome::Started);
    assert_eq!(s.start(), StartOutcome::AlreadyRunning);
    assert!(wait_for(|| sink.len() == 1, Duration::from_secs(3)).await);

    assert!(s.stop().await);
    assert_eq!(s.state(), MonitorState::Stopped);

    // A new run starts with empty regime state, so the cross is reported again.
    assert_eq!(s.start(), StartOutcome::Started);
    assert!(wait_for(|| sink.len() == 2, Duration::from_secs(3)).await);
    assert!(s.stop().await);
}

#[tokio::test]
async fn stop_mid_sleep_returns_within_a_slice() {
    let mut cfg = fast_cfg();
    cfg.check_interval = Duration::from_secs(60);
    cfg.sleep_slice = Duration::from_millis(50);

    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();
    assert!(wait_for(|| sink.len() == 1, Duration::from_secs(3)).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert!(s.stop().await);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(s.state(), MonitorState::Stopped);
    assert_eq!(source.calls_for("bitcoin"), 1);
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() {
    let source = MockSource::new();
    let sink = CollectingSink::new();
    let s = scheduler(fast_cfg(), &source, &sink);

    assert!(s.stop().await);
    assert_eq!(s.state(), MonitorState::Idle);
}

#[tokio::test]
async fn stop_timeout_detaches_and_blocks_restart_until_exit() {
    let mut cfg = fast_cfg();
    cfg.stop_timeout = Duration::from_millis(20);

    let source = MockSource::new()
        .with_asset("bitcoin", Ok(golden_cross()))
        .with_fetch_delay(Duration::from_millis(400));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();
    assert!(wait_for(|| source.calls_for("bitcoin") == 1, Duration::from_secs(3)).await);

    assert!(!s.stop().await);
    assert_eq!(s.state(), MonitorState::Stopping);
    assert_eq!(s.start(), StartOutcome::StillStopping);

    let mut rx = s.subscribe();
    let stopped = tokio::time::timeout(Duration::from_secs(3), async {
        rx.wait_for(|st| *st == MonitorState::Stopped).await.is_ok()
    })
    .await;
    assert!(matches!(stopped, Ok(true)));

    assert_eq!(s.start(), StartOutcome::Started);
    assert!(tokio::time::timeout(Duration::from_secs(3), s.stop()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn upstream_calls_are_spaced_and_stop_ends_the_pass() {
    let mut cfg = fast_cfg();
    cfg.request_delay = Duration::from_secs(1);
    cfg.sleep_slice = Duration::from_millis(100);

    let source = MockSource::new()
        .with_asset("alpha", Ok(hourly(&[1.0, 2.0, 3.0, 4.0])))
        .with_asset("beta", Ok(hourly(&[1.0, 2.0, 3.0, 4.0])))
        .with_asset("gamma", Ok(hourly(&[1.0, 2.0, 3.0, 4.0])));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(source.calls_for("alpha"), 1);
    assert_eq!(source.calls_for("beta"), 1);
    assert_eq!(source.calls_for("gamma"), 0);

    assert!(s.stop().await);

    assert_eq!(s.state(), MonitorState::Stopped);
    assert_eq!(source.calls_for("alpha"), 1);
    assert_eq!(source.calls_for("beta"), 1);
    assert_eq!(source.calls_for("gamma"), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_stop_waits_for_the_detached_loop() {
    let mut cfg = fast_cfg();
    cfg.stop_timeout = Duration::from_millis(300);

    let source = MockSource::new()
        .with_asset("bitcoin", Ok(golden_cross()))
        .with_fetch_delay(Duration::from_millis(500));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls_for("bitcoin"), 1);

    // The fetch outlives the first timeout but not the second.
    assert!(!s.stop().await);
    assert_eq!(s.state(), MonitorState::Stopping);

    assert!(s.stop().await);
    assert_eq!(s.state(), MonitorState::Stopped);

    assert!(s.stop().await);
}

#[tokio::test(start_paused = true)]
async fn repeated_stop_reports_a_loop_still_running() {
    let mut cfg = fast_cfg();
    cfg.stop_timeout = Duration::from_millis(20);

    let source = MockSource::new()
        .with_asset("bitcoin", Ok(golden_cross()))
        .with_fetch_delay(Duration::from_millis(500));
    let sink = CollectingSink::new();
    let s = scheduler(cfg, &source, &sink);

    s.refresh_now().await.unwrap();
    s.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!s.stop().await);
    assert!(!s.stop().await);
    assert_eq!(s.state(), MonitorState::Stopping);
}

#[tokio::test(start_paused = true)]
async fn refresh_in_flight_at_stop_is_not_published() {
    let source = MockSource::new()
        .with_asset("bitcoin", Ok(golden_cross()))
        .with_list_delay(Duration::from_secs(2));
    let sink = CollectingSink::new();
    let display = RecordingDisplay::default();

    let s = MonitorScheduler::new(
        fast_cfg(),
        Arc::new(source.clone()),
        AssetRegistry::new(),
        Arc::new(sink.clone()),
        Arc::new(display.clone()),
    );

    s.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*source.list_calls.lock(), 1);

    assert!(s.stop().await);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(s.registry().is_empty());
    assert!(display.refreshes.lock().is_empty());
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn empty_registry_is_filled_by_background_refresh() {
    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let s = scheduler(fast_cfg(), &source, &sink);

    assert!(s.registry().is_empty());
    s.start();

    assert!(wait_for(|| sink.len() == 1, Duration::from_secs(3)).await);
    assert_eq!(s.registry().len(), 1);
    assert!(*source.list_calls.lock() >= 1);
    assert!(s.stop().await);
}

#[tokio::test]
async fn display_sees_refreshes_and_lifecycle() {
    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let sink = CollectingSink::new();
    let display = RecordingDisplay::default();

    let s = MonitorScheduler::new(
        fast_cfg(),
        Arc::new(source.clone()),
        AssetRegistry::new(),
        Arc::new(sink.clone()),
        Arc::new(display.clone()),
    );

    s.refresh_now().await.unwrap();
    assert_eq!(display.refreshes.lock().first(), Some(&1));

    let mut rx = s.subscribe();
    s.start();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), MonitorState::Running);

    assert!(s.stop().await);
    assert_eq!(*rx.borrow_and_update(), MonitorState::Stopped);
    assert_eq!(
        *display.states.lock(),
        vec![MonitorState::Running, MonitorState::Stopping, MonitorState::Stopped]
    );
}

struct PanickingSink;

impl AlertSink for PanickingSink {
    fn on_alert(&self, _event: &AlertEvent) {
        panic!("sink exploded");
    }
}

#[tokio::test]
async fn panicking_alert_sink_does_not_stop_the_loop() {
    let source = MockSource::new().with_asset("bitcoin", Ok(golden_cross()));
    let s = MonitorScheduler::new(
        fast_cfg(),
        Arc::new(source.clone()),
        AssetRegistry::new(),
        Arc::new(PanickingSink),
        Arc::new(NoopDisplay),
    );

    s.refresh_now().await.unwrap();
    s.start();

    assert!(wait_for(|| source.calls_for("bitcoin") >= 3, Duration::from_secs(3)).await);
    assert_eq!(s.state(), MonitorState::Running);
    assert!(s.stop().await);
}
