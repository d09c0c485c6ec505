use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("sample rate must be at least 1 frame")]
    InvalidSampleRate,
    #[error("z-score threshold must be a finite, non-negative number (got {0})")]
    InvalidThreshold(f64),
    #[error("model input size must be at least 1 pixel")]
    InvalidInputSize,
}

fn default_video_path() -> PathBuf {
    PathBuf::from("data/parking_1920_1080_loop.mp4")
}

fn default_mask_path() -> PathBuf {
    PathBuf::from("data/mask_1920_1080.png")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("data/spot_model.json")
}

fn default_input_size() -> usize {
    15
}

fn default_sample_rate() -> u64 {
    30
}

fn default_z_score_threshold() -> f64 {
    2.0
}

fn default_http_enabled() -> bool {
    true
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_path")]
    pub path: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: default_video_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskConfig {
    #[serde(default = "default_mask_path")]
    pub path: PathBuf,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            path: default_mask_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Svm,
    Onnx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub kind: ModelKind,
    /// Side length of the square image the model was trained on.
    #[serde(default = "default_input_size")]
    pub input_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            kind: ModelKind::default(),
            input_size: default_input_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Run change detection on every Nth frame.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u64,
    #[serde(default = "default_z_score_threshold")]
    pub z_score_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            z_score_threshold: default_z_score_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub mask: MaskConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        let threshold = self.monitor.z_score_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        if self.model.input_size == 0 {
            return Err(ConfigError::InvalidInputSize);
        }

        Ok(())
    }
}
