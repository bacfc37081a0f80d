//! Raw CoinGecko payloads and their conversion into market types.

use chrono::DateTime;
use serde::Deserialize;

use crate::error::MarketError;
use crate::types::{Asset, TimeSeries, TimeSeriesPoint};

/// Row of `/coins/markets`.
#[derive(Debug, Deserialize)]
pub struct MarketEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,

    #[serde(default)]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub price_change_percentage_24h_in_currency: Option<f64>,

    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,

    #[serde(default)]
    pub price_change_percentage_1d_in_currency: Option<f64>,
}

/// Body of `/coins/{id}/market_chart`. Only prices are used.
#[derive(Debug, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<Vec<Option<f64>>>,
}

/// Ranks follow response order, which is market cap descending.
pub fn to_assets(entries: Vec<MarketEntry>) -> Vec<Asset> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| Asset {
            id: e.id,
            symbol: e.symbol,
            name: e.name,
            rank: i as u32 + 1,
            price: e.current_price,
            change_24h_pct: e
                .price_change_percentage_24h_in_currency
                .or(e.price_change_percentage_24h),
            change_utc_day_pct: e.price_change_percentage_1d_in_currency,
        })
        .collect()
}

/// `[[ts_ms, open, high, low, close], ..]`. Rows with a missing or null field are dropped.
pub fn ohlc_rows_to_series(rows: Vec<Vec<Option<f64>>>) -> TimeSeries {
    TimeSeries::new(rows.into_iter().filter_map(|row| match row.as_slice() {
        [Some(ts), Some(open), Some(high), Some(low), Some(close), ..] => Some(TimeSeriesPoint {
            ts: DateTime::from_timestamp_millis(*ts as i64)?,
            open: *open,
            high: *high,
            low: *low,
            close: *close,
        }),
        _ => None,
    }))
}

/// `[[ts_ms, price], ..]`. Rows with a missing or null field are dropped.
pub fn price_rows_to_series(rows: Vec<Vec<Option<f64>>>) -> TimeSeries {
    TimeSeries::new(rows.into_iter().filter_map(|row| match row.as_slice() {
        [Some(ts), Some(close), ..] => Some(TimeSeriesPoint::from_close(
            DateTime::from_timestamp_millis(*ts as i64)?,
            *close,
        )),
        _ => None,
    }))
}

/// Parses a `/coins/markets` body.
pub fn parse_markets(body: &str) -> Result<Vec<Asset>, MarketError> {
    let entries: Vec<MarketEntry> = serde_json::from_str(body)?;
    Ok(to_assets(entries))
}

/// Parses a `/coins/{id}/ohlc` body.
pub fn parse_ohlc(body: &str) -> Result<TimeSeries, MarketError> {
    let rows: Vec<Vec<Option<f64>>> = serde_json::from_str(body)?;
    Ok(ohlc_rows_to_series(rows))
}

/// Parses a `/coins/{id}/market_chart` body.
pub fn parse_market_chart(body: &str) -> Result<TimeSeries, MarketError> {
    let chart: MarketChart = serde_json::from_str(body)?;
    Ok(price_rows_to_series(chart.prices))
}
