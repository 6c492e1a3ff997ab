//! Inference for a pretrained Keras-style sequential network.
//!
//! The network is stored as JSON: an ordered list of layers with their
//! weights in Keras layout. Supported layers are `lstm`, `dropout` (identity
//! at inference) and `dense`. Input is `[batch, timesteps, 1]`, output is one
//! scalar per sample.
//!
//! ```json
//! {
//!   "layers": [
//!     {"type": "lstm", "units": 50, "activation": "relu", "return_sequences": true,
//!      "kernel": [[...]], "recurrent_kernel": [[...]], "bias": [...]},
//!     {"type": "dropout", "rate": 0.2},
//!     {"type": "dense", "units": 1, "kernel": [[...]], "bias": [...]}
//!   ]
//! }
//! ```

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    HardSigmoid,
}

impl Activation {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::HardSigmoid => (0.2 * x + 0.5).clamp(0.0, 1.0),
        }
    }
}

fn default_tanh() -> Activation {
    Activation::Tanh
}

fn default_sigmoid() -> Activation {
    Activation::Sigmoid
}

/// On-disk form of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Lstm {
        units: usize,
        #[serde(default = "default_tanh")]
        activation: Activation,
        #[serde(default = "default_sigmoid")]
        recurrent_activation: Activation,
        #[serde(default)]
        return_sequences: bool,
        kernel: Vec<Vec<f32>>,
        recurrent_kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
    },
    Dropout {
        rate: f32,
    },
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
        kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
    },
}

/// LSTM with Keras gate order `i, f, c, o` packed along the last weight axis.
#[derive(Debug, Clone)]
struct Lstm {
    units: usize,
    activation: Activation,
    recurrent_activation: Activation,
    return_sequences: bool,
    kernel: Array2<f32>,
    recurrent_kernel: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Debug, Clone)]
struct Dense {
    activation: Activation,
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Debug, Clone)]
enum Layer {
    Lstm(Lstm),
    Dense(Dense),
}

/// Intermediate tensor between layers.
enum Activations {
    Sequence(Array3<f32>),
    Flat(Array2<f32>),
}

#[derive(Debug, Clone)]
pub struct SequenceModel {
    name: Option<String>,
    layers: Vec<Layer>,
}

fn matrix(
    name: &str,
    rows: Vec<Vec<f32>>,
    shape: (usize, usize),
) -> Result<Array2<f32>, StockError> {
    let got_rows = rows.len();
    let got_cols = rows.first().map_or(0, Vec::len);
    if got_rows != shape.0 || rows.iter().any(|r| r.len() != shape.1) {
        return Err(StockError::Model(format!(
            "{name} has shape [{got_rows}, {got_cols}], expected [{}, {}]",
            shape.0, shape.1
        )));
    }
    Array2::from_shape_vec(shape, rows.into_iter().flatten().collect())
        .map_err(|e| StockError::Model(format!("{name}: {e}")))
}

fn vector(name: &str, values: Vec<f32>, len: usize) -> Result<Array1<f32>, StockError> {
    if values.len() != len {
        return Err(StockError::Model(format!(
            "{name} has length {}, expected {len}",
            values.len()
        )));
    }
    Ok(Array1::from(values))
}

/// Shape flowing between layers while validating a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Sequence(usize),
    Flat(usize),
}

impl SequenceModel {
    /// Read and validate a model file.
    pub fn load(path: &Path) -> Result<Self, StockError> {
        let load_err = |reason: String| StockError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;
        let file: ModelFile = serde_json::from_slice(&raw).map_err(|e| load_err(e.to_string()))?;
        Self::from_file(file).map_err(|e| load_err(e.to_string()))
    }

    pub fn from_file(file: ModelFile) -> Result<Self, StockError> {
        let mut flow = Flow::Sequence(1);
        let mut layers = Vec::with_capacity(file.layers.len());

        for (idx, spec) in file.layers.into_iter().enumerate() {
            match spec {
                LayerSpec::Dropout { .. } => {}
                LayerSpec::Lstm {
                    units,
                    activation,
                    recurrent_activation,
                    return_sequences,
                    kernel,
                    recurrent_kernel,
                    bias,
                } => {
                    let Flow::Sequence(input_dim) = flow else {
                        return Err(StockError::Model(format!(
                            "layer {idx}: lstm needs a sequence input"
                        )));
                    };
                    let layer = Lstm {
                        units,
                        activation,
                        recurrent_activation,
                        return_sequences,
                        kernel: matrix(
                            &format!("layer {idx} kernel"),
                            kernel,
                            (input_dim, 4 * units),
                        )?,
                        recurrent_kernel: matrix(
                            &format!("layer {idx} recurrent_kernel"),
                            recurrent_kernel,
                            (units, 4 * units),
                        )?,
                        bias: vector(&format!("layer {idx} bias"), bias, 4 * units)?,
                    };
                    flow = if return_sequences {
                        Flow::Sequence(units)
                    } else {
                        Flow::Flat(units)
                    };
                    layers.push(Layer::Lstm(layer));
                }
                LayerSpec::Dense {
                    units,
                    activation,
                    kernel,
                    bias,
                } => {
                    let Flow::Flat(input_dim) = flow else {
                        return Err(StockError::Model(format!(
                            "layer {idx}: dense needs a flat input"
                        )));
                    };
                    layers.push(Layer::Dense(Dense {
                        activation,
                        kernel: matrix(
                            &format!("layer {idx} kernel"),
                            kernel,
                            (input_dim, units),
                        )?,
                        bias: vector(&format!("layer {idx} bias"), bias, units)?,
                    }));
                    flow = Flow::Flat(units);
                }
            }
        }

        if flow != Flow::Flat(1) {
            return Err(StockError::Model(format!(
                "model must end in a single output, ends in {flow:?}"
            )));
        }

        Ok(Self {
            name: file.name,
            layers,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run a forward pass over `[batch, timesteps, 1]` inputs.
    pub fn predict(&self, inputs: &Array3<f32>) -> Result<Vec<f32>, StockError> {
        if inputs.shape()[2] != 1 {
            return Err(StockError::Model(format!(
                "expected one feature per timestep, got {}",
                inputs.shape()[2]
            )));
        }

        let mut x = Activations::Sequence(inputs.clone());
        for layer in &self.layers {
            x = match (layer, x) {
                (Layer::Lstm(lstm), Activations::Sequence(seq)) => lstm.forward(&seq),
                (Layer::Dense(dense), Activations::Flat(flat)) => {
                    Activations::Flat(dense.forward(flat.view()))
                }
                _ => return Err(StockError::Model("layer input mismatch".into())),
            };
        }

        match x {
            Activations::Flat(out) => Ok(out.column(0).to_vec()),
            Activations::Sequence(_) => Err(StockError::Model("model produced a sequence".into())),
        }
    }
}

impl Lstm {
    fn forward(&self, x: &Array3<f32>) -> Activations {
        let (batch, steps, _) = x.dim();
        let u = self.units;
        let mut h = Array2::<f32>::zeros((batch, u));
        let mut c = Array2::<f32>::zeros((batch, u));
        let mut seq = self
            .return_sequences
            .then(|| Array3::<f32>::zeros((batch, steps, u)));

        let rec = |v: f32| self.recurrent_activation.apply(v);
        let act = |v: f32| self.activation.apply(v);

        for t in 0..steps {
            let xt = x.index_axis(Axis(1), t);
            let z = xt.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;

            let i = z.slice(s![.., 0..u]).mapv(rec);
            let f = z.slice(s![.., u..2 * u]).mapv(rec);
            let g = z.slice(s![.., 2 * u..3 * u]).mapv(act);
            let o = z.slice(s![.., 3 * u..4 * u]).mapv(rec);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(act);

            if let Some(seq) = seq.as_mut() {
                seq.index_axis_mut(Axis(1), t).assign(&h);
            }
        }

        match seq {
            Some(seq) => Activations::Sequence(seq),
            None => Activations::Flat(h),
        }
    }
}

impl Dense {
    fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        (x.dot(&self.kernel) + &self.bias).mapv(|v| self.activation.apply(v))
    }
}
