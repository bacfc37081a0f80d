use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::coingecko::types::{parse_market_chart, parse_markets, parse_ohlc};
use crate::error::MarketError;
use crate::source::MarketDataSource;
use crate::types::{Asset, TimeSeries};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// HTTP adapter for the public CoinGecko v3 API.
#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    url: String,
}

impl CoinGeckoClient {
    /// Every request is bounded by `timeout`; an expired request is a `Network` error.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MarketError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, MarketError> {
        let url = format!("{}{}", self.url, path);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_asset_list(
        &self,
        quote_currency: &str,
        limit: usize,
    ) -> Result<Vec<Asset>, MarketError> {
        let body = self
            .get_text(
                "/coins/markets",
                &[
                    ("vs_currency", quote_currency.to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", limit.to_string()),
                    ("page", "1".to_string()),
                    ("sparkline", "false".to_string()),
                    ("price_change_percentage", "1d,24h".to_string()),
                ],
            )
            .await?;

        let assets = parse_markets(&body)?;
        debug!(count = assets.len(), "asset list fetched");

        Ok(assets)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_ohlc(
        &self,
        asset_id: &str,
        quote_currency: &str,
        lookback_days: u32,
    ) -> Result<TimeSeries, MarketError> {
        let body = self
            .get_text(
                &format!("/coins/{asset_id}/ohlc"),
                &[
                    ("vs_currency", quote_currency.to_string()),
                    ("days", lookback_days.to_string()),
                ],
            )
            .await?;

        let series = parse_ohlc(&body)?;
        debug!(points = series.len(), "ohlc fetched");

        Ok(series)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_close_history(
        &self,
        asset_id: &str,
        quote_currency: &str,
        lookback_days: u32,
    ) -> Result<TimeSeries, MarketError> {
        let body = self
            .get_text(
                &format!("/coins/{asset_id}/market_chart"),
                &[
                    ("vs_currency", quote_currency.to_string()),
                    ("days", lookback_days.to_string()),
                ],
            )
            .await?;

        let series = parse_market_chart(&body)?;
        debug!(points = series.len(), "close history fetched");

        Ok(series)
    }
}
