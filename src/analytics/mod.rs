mod change;
mod classifier;
#[cfg(feature = "onnx")]
mod onnx;
mod pipeline;
mod svm;

pub use change::{mean_intensity, spot_diffs, z_scores, ChangeDetector, DEFAULT_Z_SCORE_THRESHOLD};
pub use classifier::{
    preprocess, ClassifierError, ModelLabel, OccupancyClassifier, SpotModel, DEFAULT_INPUT_SIZE,
};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use pipeline::{
    spawn_session, FrameOutcome, Monitor, MonitorError, MonitorState, SampleReport, Session,
    SessionSummary, StatusChange,
};
pub use svm::{Kernel, SvmModel};
