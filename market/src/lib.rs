pub mod coingecko;
pub mod error;
pub mod moving_average;
pub mod registry;
pub mod source;
pub mod types;

pub use error::MarketError;
pub use registry::AssetRegistry;
pub use source::MarketDataSource;
pub use types::{Asset, MovingAverageSample, TimeSeries, TimeSeriesPoint, Timeframe};
