pub mod client;
pub mod types;

pub use client::{CoinGeckoClient, DEFAULT_BASE_URL};
