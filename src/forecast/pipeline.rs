use serde::Serialize;
use tracing::info;

use crate::error::StockError;
use crate::forecast::actor::PredictorHandle;
use crate::forecast::scaler::MinMaxScaler;
use crate::forecast::stats::{Statistics, describe};
use crate::forecast::window::{Windows, sliding_windows};
use crate::forecast::PipelineConfig;
use crate::market::{PriceBar, PriceHistory};

/// Body of a successful `/fetch-data` response.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub data: Vec<PriceBar>,
    pub predictions: Vec<f64>,
    pub actual: Vec<f64>,
    pub statistics: Statistics,
}

/// Scaled model inputs for the held-out part of a close series.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub scaler: MinMaxScaler,
    pub windows: Windows,
}

/// Fit the scaler on the training slice and cut windows over the testing slice,
/// seeded with the tail of the training data so the first test day has a full window.
pub fn prepare(closes: &[f64], cfg: &PipelineConfig) -> Result<Prepared, StockError> {
    let split = (closes.len() as f64 * cfg.train_ratio).floor() as usize;
    let split = split.min(closes.len());
    let (training, testing) = closes.split_at(split);

    let scaler = MinMaxScaler::fit(training).map_err(|_| StockError::InsufficientHistory {
        needed: cfg.window,
        got: closes.len(),
    })?;

    let seed = &training[training.len().saturating_sub(cfg.window)..];
    let input: Vec<f64> = seed
        .iter()
        .chain(testing)
        .map(|v| scaler.transform(*v))
        .collect();

    let windows = sliding_windows(&input, cfg.window);
    if windows.is_empty() {
        return Err(StockError::InsufficientHistory {
            needed: cfg.window,
            got: input.len(),
        });
    }
    Ok(Prepared { scaler, windows })
}

/// Divide model outputs and targets by the scaler's factor, i.e. multiply by the
/// training range. The training minimum is not added back, so values are price
/// moves above that minimum.
pub fn rescale(prepared: &Prepared, raw: &[f32]) -> Result<(Vec<f64>, Vec<f64>), StockError> {
    if raw.len() != prepared.windows.len() {
        return Err(StockError::Model(format!(
            "model returned {} predictions for {} windows",
            raw.len(),
            prepared.windows.len()
        )));
    }
    let predictions = raw
        .iter()
        .map(|v| prepared.scaler.unscale(f64::from(*v)))
        .collect();
    let actual = prepared
        .windows
        .targets
        .iter()
        .map(|v| prepared.scaler.unscale(*v))
        .collect();
    Ok((predictions, actual))
}

/// Full fetch-data pipeline over an already downloaded history.
pub async fn forecast(
    history: PriceHistory,
    predictor: &PredictorHandle,
    cfg: &PipelineConfig,
) -> Result<ForecastReport, StockError> {
    if history.is_empty() {
        return Err(StockError::NoData);
    }

    let statistics = describe(&history);
    let prepared = prepare(&history.closes(), cfg)?;
    let raw = predictor.predict(prepared.windows.inputs.clone()).await?;
    let (predictions, actual) = rescale(&prepared, &raw)?;

    info!(
        ticker = %history.ticker,
        rows = history.len(),
        predictions = predictions.len(),
        "forecast complete"
    );

    Ok(ForecastReport {
        data: history.bars,
        predictions,
        actual,
        statistics,
    })
}
