use async_trait::async_trait;

use crate::error::MarketError;
use crate::types::{Asset, TimeSeries};

/// Upstream market data provider.
///
/// Implementations never panic across this boundary: transport and payload
/// problems come back as `MarketError`, and an empty payload may come back as
/// an empty result. Callers treat both as "skip this unit of work".
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Top `limit` assets by market cap, ranked from 1.
    async fn fetch_asset_list(
        &self,
        quote_currency: &str,
        limit: usize,
    ) -> Result<Vec<Asset>, MarketError>;

    /// Provider OHLC candles over the last `lookback_days`.
    async fn fetch_ohlc(
        &self,
        asset_id: &str,
        quote_currency: &str,
        lookback_days: u32,
    ) -> Result<TimeSeries, MarketError>;

    /// Close-only history; open/high/low are synthesized equal to close.
    async fn fetch_close_history(
        &self,
        asset_id: &str,
        quote_currency: &str,
        lookback_days: u32,
    ) -> Result<TimeSeries, MarketError>;
}
