//! Terminal front-ends for alerts, the price table and chart dumps.

use std::fmt::Write as _;
use std::io::Write as _;

use chrono::{DateTime, Utc};
use market::{Asset, MovingAverageSample, TimeSeries};
use scheduler::{DisplaySink, MonitorState};
use signals::{AlertEvent, AlertSink};
use tracing::warn;

/// Prints every alert as a timestamped block on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAlertSink;

impl AlertSink for ConsoleAlertSink {
    fn on_alert(&self, event: &AlertEvent) {
        warn!(
            alert_id = %event.alert_id,
            asset = %event.asset_id,
            timeframe = %event.timeframe,
            kind = %event.kind,
            price = event.trigger_price,
            "moving-average crossover"
        );

        let block = format_alert(event, Utc::now());
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{block}");
    }
}

/// Prints the price table on every registry refresh and lifecycle changes.
#[derive(Debug, Clone)]
pub struct ConsoleDisplay {
    quote_currency: String,
}

impl ConsoleDisplay {
    pub fn new(quote_currency: impl Into<String>) -> Self {
        Self {
            quote_currency: quote_currency.into(),
        }
    }
}

impl DisplaySink for ConsoleDisplay {
    fn on_assets(&self, assets: &[Asset]) {
        let table = format_asset_table(assets, &self.quote_currency, Utc::now());
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{table}");
    }

    fn on_state(&self, state: MonitorState) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Monitoring: {state}");
    }
}

pub fn format_alert(event: &AlertEvent, now: DateTime<Utc>) -> String {
    format!(
        "==== ALERT {} ====\n{}\n",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        event
    )
}

/// `+1.23%`, `-0.50%` or `N/A`.
pub fn format_change(pct: Option<f64>) -> String {
    match pct {
        Some(v) if v.is_finite() => format!("{v:+.2}%"),
        _ => "N/A".to_string(),
    }
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p.is_finite() => format!("{p:.4}"),
        _ => "N/A".to_string(),
    }
}

pub fn format_asset_table(assets: &[Asset], quote_currency: &str, now: DateTime<Utc>) -> String {
    let mut s = String::new();
    let price_header = format!("Price ({})", quote_currency.to_uppercase());

    let _ = writeln!(
        s,
        "{:>4}  {:<28} {:>16} {:>9} {:>9}",
        "#", "Asset", price_header, "24h", "UTC day"
    );

    for a in assets {
        let _ = writeln!(
            s,
            "{:>4}  {:<28} {:>16} {:>9} {:>9}",
            a.rank,
            a.display_name(),
            format_price(a.price),
            format_change(a.change_24h_pct),
            format_change(a.change_utc_day_pct),
        );
    }

    let _ = write!(s, "Prices updated {}", now.format("%H:%M:%S UTC"));
    s
}

/// The last `rows` candles of `series` next to their moving averages.
pub fn format_candles(
    title: &str,
    series: &TimeSeries,
    samples: &[MovingAverageSample],
    short_period: usize,
    long_period: usize,
    rows: usize,
) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "{title}");
    let _ = writeln!(
        s,
        "{:<17} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Time (UTC)",
        "Open",
        "High",
        "Low",
        "Close",
        format!("MA{short_period}"),
        format!("MA{long_period}"),
    );

    let skip = series.len().saturating_sub(rows);
    for (p, ma) in series.points().iter().zip(samples).skip(skip) {
        let _ = writeln!(
            s,
            "{:<17} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12} {:>12}",
            p.ts.format("%Y-%m-%d %H:%M"),
            p.open,
            p.high,
            p.low,
            p.close,
            ma.short.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into()),
            ma.long.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into()),
        );
    }

    s
}
