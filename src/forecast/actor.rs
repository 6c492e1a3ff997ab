use crate::error::StockError;
use crate::forecast::model::SequenceModel;

use ndarray::Array3;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Messages handled by the predictor actor.
#[derive(Debug)]
pub enum PredictorMessage {
    /// Run the model over `[samples, width, 1]` windows.
    Predict(Array3<f32>, RpcReplyPort<Result<Vec<f32>, StockError>>),
    /// Drop the cached model; the next prediction reads the file again.
    Reload,
}

/// Handle for interacting with the predictor actor.
#[derive(Clone)]
pub struct PredictorHandle {
    actor: ActorRef<PredictorMessage>,
}

impl PredictorHandle {
    pub async fn predict(&self, windows: Array3<f32>) -> Result<Vec<f32>, StockError> {
        ractor::call!(self.actor, PredictorMessage::Predict, windows)
            .map_err(|e| StockError::RactorError(format!("Predict RPC failed: {e}")))?
    }

    pub fn reload(&self) {
        let _ = ractor::cast!(self.actor, PredictorMessage::Reload);
    }
}

struct PredictorState {
    model_path: PathBuf,
    model: Option<Arc<SequenceModel>>,
}

impl PredictorState {
    /// Return the cached model, loading it from disk on first use.
    async fn model(&mut self) -> Result<Arc<SequenceModel>, StockError> {
        if let Some(model) = &self.model {
            return Ok(Arc::clone(model));
        }

        let path = self.model_path.clone();
        let loaded = tokio::task::spawn_blocking(move || SequenceModel::load(&path))
            .await
            .map_err(|e| StockError::RactorError(format!("model load task failed: {e}")))??;
        info!(
            path = %self.model_path.display(),
            name = loaded.name().unwrap_or("-"),
            "model loaded"
        );

        let model = Arc::new(loaded);
        self.model = Some(Arc::clone(&model));
        Ok(model)
    }
}

/// ractor-based owner of the pretrained model
struct PredictorActor;

#[ractor::async_trait]
impl Actor for PredictorActor {
    type Msg = PredictorMessage;
    type State = PredictorState;
    type Arguments = PathBuf;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        model_path: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(path = %model_path.display(), "PredictorActor started; model loads on first request");
        Ok(PredictorState {
            model_path,
            model: None,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            PredictorMessage::Predict(windows, reply) => {
                let result = self.handle_predict(state, windows).await;
                if let Err(e) = &result {
                    warn!(error = %e, "prediction failed");
                }
                let _ = reply.send(result);
            }
            PredictorMessage::Reload => {
                info!(path = %state.model_path.display(), "model cache cleared");
                state.model = None;
            }
        }
        Ok(())
    }
}

impl PredictorActor {
    async fn handle_predict(
        &self,
        state: &mut PredictorState,
        windows: Array3<f32>,
    ) -> Result<Vec<f32>, StockError> {
        let model = state.model().await?;
        let samples = windows.shape()[0];

        let out = tokio::task::spawn_blocking(move || model.predict(&windows))
            .await
            .map_err(|e| StockError::RactorError(format!("inference task failed: {e}")))??;
        debug!(samples, "inference complete");
        Ok(out)
    }
}

/// Spawn the predictor actor for the model stored at `model_path`.
pub async fn spawn(model_path: PathBuf) -> Result<PredictorHandle, StockError> {
    // unnamed: several predictors may coexist in one process
    let (actor, _jh) = Actor::spawn(None, PredictorActor, model_path)
        .await
        .map_err(|e| StockError::RactorError(format!("failed to spawn PredictorActor: {e}")))?;
    Ok(PredictorHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::model::{Activation, LayerSpec, ModelFile};

    fn write_model(dir: &std::path::Path, dense_bias: f32) -> PathBuf {
        let file = ModelFile {
            name: None,
            layers: vec![
                LayerSpec::Lstm {
                    units: 1,
                    activation: Activation::Tanh,
                    recurrent_activation: Activation::Sigmoid,
                    return_sequences: false,
                    kernel: vec![vec![0.0; 4]],
                    recurrent_kernel: vec![vec![0.0; 4]],
                    bias: vec![0.0; 4],
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Linear,
                    kernel: vec![vec![1.0]],
                    bias: vec![dense_bias],
                },
            ],
        };
        let path = dir.join("model.json");
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn caches_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), 0.5);
        let handle = spawn(path.clone()).await.unwrap();

        let out = handle.predict(Array3::zeros((2, 3, 1))).await.unwrap();
        assert_eq!(out, vec![0.5, 0.5]);

        write_model(dir.path(), 2.0);
        let cached = handle.predict(Array3::zeros((1, 3, 1))).await.unwrap();
        assert_eq!(cached, vec![0.5]);

        handle.reload();
        let reloaded = handle.predict(Array3::zeros((1, 3, 1))).await.unwrap();
        assert_eq!(reloaded, vec![2.0]);
    }

    #[tokio::test]
    async fn independent_predictors_coexist() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = spawn(write_model(dir_a.path(), 0.25)).await.unwrap();
        let b = spawn(write_model(dir_b.path(), 0.75)).await.unwrap();

        assert_eq!(a.predict(Array3::zeros((1, 3, 1))).await.unwrap(), vec![0.25]);
        assert_eq!(b.predict(Array3::zeros((1, 3, 1))).await.unwrap(), vec![0.75]);
    }

    #[tokio::test]
    async fn missing_model_is_reported_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let handle = spawn(path).await.unwrap();

        let err = handle.predict(Array3::zeros((1, 3, 1))).await.unwrap_err();
        assert!(matches!(err, StockError::ModelLoad { .. }));

        write_model(dir.path(), 1.0);
        let out = handle.predict(Array3::zeros((1, 3, 1))).await.unwrap();
        assert_eq!(out, vec![1.0]);
    }
}
