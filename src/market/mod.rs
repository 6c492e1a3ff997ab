//! Market data: price history types and the provider seam.

pub mod types;
pub mod yahoo;

use futures::future::BoxFuture;

use crate::error::StockError;
pub use types::{HistoryQuery, PriceBar, PriceHistory};
pub use yahoo::YahooFinance;

/// Source of daily price history. An unknown ticker yields an empty history, not an error.
pub trait MarketData: Send + Sync {
    fn history<'a>(
        &'a self,
        query: &'a HistoryQuery,
    ) -> BoxFuture<'a, Result<PriceHistory, StockError>>;
}
