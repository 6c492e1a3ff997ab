use crate::error::StockError;

/// Min-max scaling of a single feature into `[0, 1]`.
///
/// A constant series has zero range; its scale is forced to 1 so every value
/// maps to 0 instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    data_min: f64,
    scale: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self, StockError> {
        let (data_min, data_max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .ok_or(StockError::InsufficientHistory { needed: 1, got: 0 })?;

        let range = data_max - data_min;
        let scale = if range == 0.0 { 1.0 } else { 1.0 / range };
        Ok(Self { data_min, scale })
    }

    pub fn data_min(&self) -> f64 {
        self.data_min
    }

    /// Multiplier applied to `value - data_min`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.data_min) * self.scale
    }

    /// Undo the scale factor only; the result is relative to `data_min`.
    pub fn unscale(&self, scaled: f64) -> f64 {
        scaled / self.scale
    }
}
