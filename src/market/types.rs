use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::StockError;

/// Daily history request; `start` is inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryQuery {
    /// Validate raw request fields into a query.
    pub fn parse(ticker: &str, start: &str, end: &str) -> Result<Self, StockError> {
        let ticker = ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(StockError::InvalidRequest("ticker is required".into()));
        }
        if ticker.len() > 16
            || !ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '_'))
        {
            return Err(StockError::InvalidRequest(format!(
                "invalid ticker: {ticker}"
            )));
        }

        let start = parse_date("start_date", start)?;
        let end = parse_date("end_date", end)?;
        if start >= end {
            return Err(StockError::InvalidRequest(
                "start_date must be before end_date".into(),
            ));
        }
        Ok(Self { ticker, start, end })
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, StockError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        StockError::InvalidRequest(format!("{field} must be a YYYY-MM-DD date, got {raw:?}"))
    })
}

/// One trading day. Only `close` is guaranteed; the provider may omit the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    #[serde(rename = "Date", serialize_with = "serialize_date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
}

fn serialize_date<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&date.format("%Y-%m-%d"))
}

impl PriceBar {
    /// Bar with every price set to `close`, handy for synthetic series.
    pub fn flat(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close,
            adj_close: Some(close),
            volume: Some(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Numeric columns in display order, as optional values per row.
    pub fn columns(&self) -> Vec<(&'static str, Vec<Option<f64>>)> {
        let col = |f: fn(&PriceBar) -> Option<f64>| self.bars.iter().map(f).collect::<Vec<_>>();
        vec![
            ("Open", col(|b| b.open)),
            ("High", col(|b| b.high)),
            ("Low", col(|b| b.low)),
            ("Close", col(|b| Some(b.close))),
            ("Adj Close", col(|b| b.adj_close)),
            ("Volume", col(|b| b.volume.map(|v| v as f64))),
        ]
    }
}
