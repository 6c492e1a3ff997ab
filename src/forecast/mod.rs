//! Closing-price forecasting: scaling, windowing, statistics and model inference.

pub mod actor;
pub mod model;
pub mod pipeline;
pub mod scaler;
pub mod stats;
pub mod window;

pub use actor::PredictorHandle;
pub use model::SequenceModel;
pub use pipeline::{ForecastReport, forecast};
pub use scaler::MinMaxScaler;
pub use stats::{ColumnStats, Statistics, describe};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Number of past closes fed to the model per prediction.
    pub window: usize,
    /// Fraction of rows used to fit the scaler; the rest is predicted.
    pub train_ratio: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: 100,
            train_ratio: 0.70,
        }
    }
}
