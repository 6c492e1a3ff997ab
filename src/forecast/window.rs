use ndarray::Array3;

/// Model input samples cut from a scaled series.
#[derive(Debug, Clone, PartialEq)]
pub struct Windows {
    /// `[samples, width, 1]`, the layout a single-feature recurrent model expects.
    pub inputs: Array3<f32>,
    /// The value right after each window.
    pub targets: Vec<f64>,
}

impl Windows {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// For every `i` in `width..series.len()`, sample `series[i - width..i]` with target `series[i]`.
pub fn sliding_windows(series: &[f64], width: usize) -> Windows {
    let samples = series.len().saturating_sub(width);
    let targets = series.iter().skip(width).copied().collect();
    let inputs = Array3::from_shape_fn((samples, width, 1), |(s, t, _)| series[s + t] as f32);
    Windows { inputs, targets }
}
