use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;

use super::classifier::{ClassifierError, SpotModel};

/// Name of the class-label output produced by converted scikit-learn models.
const LABEL_OUTPUT: &str = "label";

/// Spot model evaluated with ONNX Runtime.
pub struct OnnxModel {
    session: Session,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let session = build_session(path).map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        tracing::info!(path = %path.display(), "loaded onnx model");

        Ok(Self { session })
    }
}

fn build_session(path: &Path) -> Result<Session, Box<dyn std::error::Error + Send + Sync>> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .commit_from_file(path)?;
    Ok(session)
}

impl SpotModel for OnnxModel {
    fn predict(&mut self, features: &[f32]) -> Result<i64, ClassifierError> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| ClassifierError::Inference(e.to_string()))?
            .into_dyn();

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let value = match outputs.get(LABEL_OUTPUT) {
            Some(v) => v,
            None => &outputs[0],
        };

        let labels = value
            .try_extract_array::<i64>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        labels
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ClassifierError::Inference("model produced no label".into()))
    }
}
