use std::path::Path;

use serde::Deserialize;

use super::classifier::{ClassifierError, SpotModel};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Rbf,
    Linear,
}

fn default_kernel() -> Kernel {
    Kernel::Rbf
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

/// Parameters of a trained two-class support vector classifier.
#[derive(Debug, Clone, Deserialize)]
struct SvmParams {
    #[serde(default = "default_kernel")]
    kernel: Kernel,
    #[serde(default)]
    gamma: f32,
    support_vectors: Vec<Vec<f32>>,
    dual_coef: Vec<f32>,
    intercept: f32,
    #[serde(default = "default_classes")]
    classes: [i64; 2],
}

/// Support vector classifier evaluated in-process.
///
/// The decision value is `sum(dual_coef[i] * K(sv[i], x)) + intercept`;
/// positive values select `classes[1]`, everything else `classes[0]`.
#[derive(Debug, Clone)]
pub struct SvmModel {
    params: SvmParams,
    features: usize,
}

impl SvmModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            support_vectors = model.params.support_vectors.len(),
            features = model.features,
            "loaded svm model"
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self, ClassifierError> {
        let params: SvmParams = serde_json::from_str(content)?;

        let Some(first) = params.support_vectors.first() else {
            return Err(ClassifierError::ModelLoad("model has no support vectors".into()));
        };
        let features = first.len();

        if params.support_vectors.iter().any(|sv| sv.len() != features) {
            return Err(ClassifierError::ModelLoad(
                "support vectors differ in length".into(),
            ));
        }
        if params.dual_coef.len() != params.support_vectors.len() {
            return Err(ClassifierError::ModelLoad(format!(
                "{} dual coefficients for {} support vectors",
                params.dual_coef.len(),
                params.support_vectors.len()
            )));
        }
        if params.kernel == Kernel::Rbf && (params.gamma.is_nan() || params.gamma <= 0.0) {
            return Err(ClassifierError::ModelLoad(
                "rbf kernel needs a positive gamma".into(),
            ));
        }

        Ok(Self { params, features })
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn decision(&self, x: &[f32]) -> Result<f32, ClassifierError> {
        if x.len() != self.features {
            return Err(ClassifierError::InputShape {
                expected: self.features,
                actual: x.len(),
            });
        }

        let sum: f32 = self
            .params
            .support_vectors
            .iter()
            .zip(&self.params.dual_coef)
            .map(|(sv, coef)| coef * self.kernel(sv, x))
            .sum();

        Ok(sum + self.params.intercept)
    }

    fn kernel(&self, sv: &[f32], x: &[f32]) -> f32 {
        match self.params.kernel {
            Kernel::Linear => sv.iter().zip(x).map(|(a, b)| a * b).sum(),
            Kernel::Rbf => {
                let dist: f32 = sv.iter().zip(x).map(|(a, b)| (a - b).powi(2)).sum();
                (-self.params.gamma * dist).exp()
            }
        }
    }
}

impl SpotModel for SvmModel {
    fn predict(&mut self, features: &[f32]) -> Result<i64, ClassifierError> {
        let decision = self.decision(features)?;
        let [negative, positive] = self.params.classes;
        Ok(if decision > 0.0 { positive } else { negative })
    }
}
