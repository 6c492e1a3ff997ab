use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use crate::error::StockError;
use crate::forecast::{ForecastReport, forecast};
use crate::market::HistoryQuery;
use crate::router::StockcastState;

#[derive(Debug, Deserialize)]
pub struct FetchDataRequest {
    pub ticker: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FetchDataRequest {
    fn into_query(self) -> Result<HistoryQuery, StockError> {
        let require = |field: &str, value: Option<String>| {
            value.ok_or_else(|| StockError::InvalidRequest(format!("{field} is required")))
        };
        let ticker = require("ticker", self.ticker)?;
        let start = require("start_date", self.start_date)?;
        let end = require("end_date", self.end_date)?;
        HistoryQuery::parse(&ticker, &start, &end)
    }
}

fn reject(rejection: JsonRejection) -> StockError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StockError::PayloadTooLarge
    } else {
        StockError::InvalidRequest(rejection.body_text())
    }
}

/// POST /fetch-data -> price history, statistics and the model's forecast.
pub async fn fetch_data(
    State(state): State<StockcastState>,
    payload: Result<Json<FetchDataRequest>, JsonRejection>,
) -> Result<Json<ForecastReport>, StockError> {
    let Json(request) = payload.map_err(reject)?;
    let query = request.into_query()?;
    info!(ticker = %query.ticker, start = %query.start, end = %query.end, "fetch-data");

    let history = state.market.history(&query).await?;
    if history.is_empty() {
        return Err(StockError::NoData);
    }

    let report = forecast(history, &state.predictor, &state.pipeline).await?;
    Ok(Json(report))
}
