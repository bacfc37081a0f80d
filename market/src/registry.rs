use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::MarketError;
use crate::source::MarketDataSource;
use crate::types::Asset;

#[derive(Default)]
struct Snapshot {
    assets: Arc<Vec<Asset>>,
    refreshed_at: Option<DateTime<Utc>>,
    /// Ticket of the refresh that published `assets`.
    ticket: u64,
}

/// Latest ranked asset list, shared between the monitoring loop, background
/// refreshes and display readers.
///
/// A refresh publishes a whole new list by swapping an `Arc`; readers hold
/// either the old or the new list, never a mix. A failed refresh leaves the
/// previous list in place.
///
/// Every refresh draws a ticket when it starts. Overlapping refreshes publish
/// only if no later-started refresh has published already.
#[derive(Clone, Default)]
pub struct AssetRegistry {
    inner: Arc<RwLock<Snapshot>>,
    tickets: Arc<AtomicU64>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Vec<Asset>> {
        Arc::clone(&self.inner.read().assets)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().refreshed_at
    }

    pub fn len(&self) -> usize {
        self.inner.read().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pulls the top `limit` assets and publishes them.
    ///
    /// An empty list counts as a format error so the previous snapshot stays in force.
    /// A fetch overtaken by a later-started refresh is discarded and the
    /// newer snapshot is returned.
    #[instrument(skip(self, source), level = "debug")]
    pub async fn refresh<S>(
        &self,
        source: &S,
        limit: usize,
        quote_currency: &str,
    ) -> Result<Arc<Vec<Asset>>, MarketError>
    where
        S: MarketDataSource + ?Sized,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;

        let fetched = match source.fetch_asset_list(quote_currency, limit).await {
            Ok(list) if list.is_empty() => {
                Err(MarketError::DataFormat("empty asset list".to_string()))
            }
            other => other,
        };

        match fetched {
            Ok(list) => {
                let assets = Arc::new(list);
                {
                    let mut g = self.inner.write();
                    if g.ticket > ticket {
                        debug!(ticket, published = g.ticket, "stale asset list discarded");
                        return Ok(Arc::clone(&g.assets));
                    }
                    g.assets = Arc::clone(&assets);
                    g.refreshed_at = Some(Utc::now());
                    g.ticket = ticket;
                }

                info!(count = assets.len(), "asset registry refreshed");
                Ok(assets)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retained = self.len(),
                    "asset registry refresh failed; keeping previous snapshot"
                );
                Err(e)
            }
        }
    }
}
