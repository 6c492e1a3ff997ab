pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod handlers;
pub mod market;
pub mod router;
pub mod templates;

pub use error::StockError;
pub use forecast::{PredictorHandle, SequenceModel};
pub use market::{MarketData, YahooFinance};
