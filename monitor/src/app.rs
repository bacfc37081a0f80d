//! Wiring of the CLI commands onto the library crates.

use std::sync::Arc;

use anyhow::Context;
use market::coingecko::CoinGeckoClient;
use market::moving_average::{moving_average_samples, resample};
use market::{AssetRegistry, MarketDataSource};
use scheduler::MonitorScheduler;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::sinks::{ConsoleAlertSink, ConsoleDisplay, format_asset_table, format_candles};

pub fn build_client(cfg: &AppConfig) -> anyhow::Result<CoinGeckoClient> {
    CoinGeckoClient::new(cfg.api_base_url.clone(), cfg.http_timeout())
        .context("failed to build market data client")
}

/// Loads the registry, runs the loop and stops it on Ctrl-C.
///
/// Fails fast when the first asset list cannot be fetched.
pub async fn run_monitor(cfg: &AppConfig) -> anyhow::Result<()> {
    let source = Arc::new(build_client(cfg)?);

    let scheduler = MonitorScheduler::new(
        cfg.scheduler_config(),
        source,
        AssetRegistry::new(),
        Arc::new(ConsoleAlertSink),
        Arc::new(ConsoleDisplay::new(&cfg.quote_currency)),
    );

    let assets = scheduler
        .refresh_now()
        .await
        .context("initial asset list fetch failed; check network access and API availability")?;
    info!(assets = assets.len(), "asset registry loaded");

    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    if !scheduler.stop().await {
        warn!("monitoring loop still running at exit");
    }

    Ok(())
}

pub async fn print_prices(cfg: &AppConfig) -> anyhow::Result<()> {
    let client = build_client(cfg)?;
    let registry = AssetRegistry::new();

    let assets = registry
        .refresh(&client, cfg.top_n_assets, &cfg.quote_currency)
        .await
        .context("failed to fetch asset list")?;

    println!(
        "{}",
        format_asset_table(&assets, &cfg.quote_currency, chrono::Utc::now())
    );
    Ok(())
}

/// Prints the 1H and 4H candles for `asset_id` with both moving averages.
pub async fn print_chart(cfg: &AppConfig, asset_id: &str, rows: usize) -> anyhow::Result<()> {
    let client = build_client(cfg)?;
    let (short, long) = (cfg.short_ma_period, cfg.long_ma_period);

    let hourly = client
        .fetch_ohlc(asset_id, &cfg.quote_currency, cfg.chart_days_short_timeframe)
        .await
        .with_context(|| format!("failed to fetch OHLC for {asset_id}"))?;

    let four_hourly = client
        .fetch_ohlc(asset_id, &cfg.quote_currency, cfg.chart_days_long_timeframe)
        .await
        .with_context(|| format!("failed to fetch OHLC for {asset_id}"))?;
    let four_hourly = resample(&four_hourly, 4);

    for (label, series) in [("1H", &hourly), ("4H", &four_hourly)] {
        if series.is_empty() {
            warn!(asset = asset_id, timeframe = label, "no candles returned");
            continue;
        }

        let samples = moving_average_samples(series, short, long);
        let title = format!("{} {} ({})", asset_id, label, cfg.quote_currency.to_uppercase());
        println!("{}", format_candles(&title, series, &samples, short, long, rows));
    }

    Ok(())
}
