use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, NaiveTime};
use futures::FutureExt;
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{HistoryQuery, MarketData, PriceBar, PriceHistory};
use crate::error::{IsRetryable, StockError};

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Daily history from the Yahoo Finance chart API.
pub struct YahooFinance {
    client: reqwest::Client,
    base_url: Url,
    limiter: Arc<DefaultDirectRateLimiter>,
    retry: ExponentialBuilder,
}

impl YahooFinance {
    pub fn new(
        base_url: Url,
        proxy: Option<&Url>,
        rate_per_minute: u32,
    ) -> Result<Self, StockError> {
        let mut builder = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; stockcast/0.1)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20));
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let rate = NonZeroU32::new(rate_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client: builder.build()?,
            base_url,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rate))),
            retry: default_retry_policy(),
        })
    }

    fn chart_url(&self, query: &HistoryQuery) -> Result<Url, StockError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StockError::MarketData(format!("unusable base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", query.ticker.as_str()]);

        let period1 = query.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = query.end.and_time(NaiveTime::MIN).and_utc().timestamp();
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }

    async fn fetch_once(&self, url: &Url, ticker: &str) -> Result<PriceHistory, StockError> {
        self.limiter.until_ready().await;

        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            info!(ticker, "ticker not found upstream");
            return Ok(PriceHistory {
                ticker: ticker.to_string(),
                bars: Vec::new(),
            });
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(ticker, %status, "market data server error (will retry)");
            return Err(StockError::UpstreamStatus(status));
        }

        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(match chart_error(&body) {
                Some(desc) => StockError::MarketData(desc),
                None => StockError::UpstreamStatus(status),
            });
        }
        parse_chart(&body, ticker)
    }
}

impl MarketData for YahooFinance {
    fn history<'a>(
        &'a self,
        query: &'a HistoryQuery,
    ) -> BoxFuture<'a, Result<PriceHistory, StockError>> {
        async move {
            let url = self.chart_url(query)?;
            debug!(%url, "requesting chart");
            let history = (|| self.fetch_once(&url, &query.ticker))
                .retry(self.retry)
                .when(|e: &StockError| e.is_retryable())
                .await?;
            info!(
                ticker = %query.ticker,
                start = %query.start,
                end = %query.end,
                rows = history.len(),
                "downloaded price history"
            );
            Ok(history)
        }
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn chart_error(body: &[u8]) -> Option<String> {
    let envelope: ChartEnvelope = serde_json::from_slice(body).ok()?;
    let err = envelope.chart.error?;
    Some(err.description.unwrap_or(err.code))
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

/// Decode a chart API response. Rows without a close are dropped.
pub(crate) fn parse_chart(body: &[u8], ticker: &str) -> Result<PriceHistory, StockError> {
    let envelope: ChartEnvelope = serde_json::from_slice(body)?;
    let empty = PriceHistory {
        ticker: ticker.to_string(),
        bars: Vec::new(),
    };

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(empty);
        }
        return Err(StockError::MarketData(
            err.description.unwrap_or(err.code),
        ));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(empty);
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default();
    let offset = result.meta.gmtoffset;

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = at(&quote.close, i)?;
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: at(&quote.open, i),
                high: at(&quote.high, i),
                low: at(&quote.low, i),
                close,
                adj_close: at(&adj.adjclose, i),
                volume: at(&quote.volume, i),
            })
        })
        .collect();

    Ok(PriceHistory {
        ticker: ticker.to_string(),
        bars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
      "chart": {
        "result": [{
          "meta": {"currency": "USD", "symbol": "AAPL", "gmtoffset": -18000},
          "timestamp": [1704205800, 1704292200, 1704378600],
          "indicators": {
            "quote": [{
              "open": [187.15, null, 182.15],
              "high": [188.44, 185.88, 183.09],
              "low": [183.89, 183.43, 180.88],
              "close": [185.64, null, 181.91],
              "volume": [82488700, 58414500, 71983600]
            }],
            "adjclose": [{"adjclose": [184.29, null, 180.59]}]
          }
        }],
        "error": null
      }
    }"#;

    #[test]
    fn parses_rows_and_skips_missing_close() {
        let history = parse_chart(SAMPLE.as_bytes(), "AAPL").unwrap();
        assert_eq!(history.len(), 2);

        let first = &history.bars[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.open, Some(187.15));
        assert_eq!(first.adj_close, Some(184.29));
        assert_eq!(first.volume, Some(82_488_700));
        assert_eq!(history.bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn not_found_is_empty() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let history = parse_chart(body.as_bytes(), "ZZZZ").unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn other_chart_errors_surface() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input - start date cannot be after end date"}}}"#;
        let err = parse_chart(body.as_bytes(), "AAPL").unwrap_err();
        assert!(matches!(err, StockError::MarketData(msg) if msg.contains("start date")));
    }

    #[test]
    fn chart_url_encodes_ticker_and_period() {
        let yahoo =
            YahooFinance::new(Url::parse("https://example.test/").unwrap(), None, 60).unwrap();
        let query = HistoryQuery::parse("^GSPC", "2024-01-01", "2024-02-01").unwrap();
        let url = yahoo.chart_url(&query).unwrap();

        assert!(url.path().starts_with("/v8/finance/chart/"));
        assert!(url.path().ends_with("GSPC"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("period1".into(), "1704067200".into())));
        assert!(pairs.contains(&("period2".into(), "1706745600".into())));
        assert!(pairs.contains(&("interval".into(), "1d".into())));
    }
}
