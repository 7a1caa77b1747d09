//! Market data for ProCryptomancer.
//!
//! [`CoinGeckoClient`] talks to a CoinGecko-compatible REST API;
//! [`PriceService`] puts a freshness cache in front of any
//! [`MarketDataSource`](cryptomancer_core::MarketDataSource).

mod coingecko;
mod service;

pub use coingecko::{CoinGeckoClient, MarketConfig};
pub use service::{MarketSnapshot, PriceError, PriceService};
