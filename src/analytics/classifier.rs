use ndarray::{Array3, ArrayView3};
use thiserror::Error;

use crate::camera::CHANNELS;
use crate::spots::OccupancyStatus;

pub const DEFAULT_INPUT_SIZE: usize = 15;

/// Gaussian kernels are cut off at this many standard deviations.
const GAUSSIAN_TRUNCATE: f32 = 4.0;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model expects {expected} features, got {actual}")]
    InputShape { expected: usize, actual: usize },
    #[error("model returned unknown label {0}")]
    UnknownLabel(i64),
    #[error("cannot classify an empty crop")]
    EmptyCrop,
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Class labels the spot model was trained with.
///
/// Class 0 is an empty spot and class 1 an occupied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ModelLabel {
    Empty = 0,
    Occupied = 1,
}

impl TryFrom<i64> for ModelLabel {
    type Error = ClassifierError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ModelLabel::Empty),
            1 => Ok(ModelLabel::Occupied),
            other => Err(ClassifierError::UnknownLabel(other)),
        }
    }
}

impl From<ModelLabel> for OccupancyStatus {
    fn from(label: ModelLabel) -> Self {
        match label {
            ModelLabel::Empty => OccupancyStatus::Empty,
            ModelLabel::Occupied => OccupancyStatus::Occupied,
        }
    }
}

/// A trained binary model over flattened `size x size x 3` images.
pub trait SpotModel: Send {
    /// Raw class label for one feature vector.
    fn predict(&mut self, features: &[f32]) -> Result<i64, ClassifierError>;
}

pub struct OccupancyClassifier {
    model: Box<dyn SpotModel>,
    input_size: usize,
}

impl OccupancyClassifier {
    pub fn new(model: Box<dyn SpotModel>, input_size: usize) -> Self {
        Self { model, input_size }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn classify(&mut self, crop: ArrayView3<u8>) -> Result<OccupancyStatus, ClassifierError> {
        let features = preprocess(crop, self.input_size)?;
        let raw = self.model.predict(&features)?;
        let label = ModelLabel::try_from(raw)?;
        Ok(label.into())
    }
}

/// Scales a crop to `size x size x 3` in `[0, 1]` and flattens it row by row.
///
/// Downscaling applies a Gaussian pre-filter first, so small details do not
/// alias into the few output pixels.
pub fn preprocess(crop: ArrayView3<u8>, size: usize) -> Result<Vec<f32>, ClassifierError> {
    let (height, width, channels) = crop.dim();
    if height == 0 || width == 0 || size == 0 {
        return Err(ClassifierError::EmptyCrop);
    }
    if channels != CHANNELS {
        return Err(ClassifierError::InputShape {
            expected: CHANNELS,
            actual: channels,
        });
    }

    let image = crop.mapv(|v| v as f32 / 255.0);

    let scale_y = height as f32 / size as f32;
    let scale_x = width as f32 / size as f32;
    let sigma_y = ((scale_y - 1.0) / 2.0).max(0.0);
    let sigma_x = ((scale_x - 1.0) / 2.0).max(0.0);

    let image = blur_axis(image, 0, sigma_y);
    let image = blur_axis(image, 1, sigma_x);

    let mut out = Vec::with_capacity(size * size * CHANNELS);
    for oy in 0..size {
        let (y0, y1, wy) = sample_coord(oy, scale_y, height);
        for ox in 0..size {
            let (x0, x1, wx) = sample_coord(ox, scale_x, width);
            for c in 0..CHANNELS {
                let top = image[[y0, x0, c]] * (1.0 - wx) + image[[y0, x1, c]] * wx;
                let bottom = image[[y1, x0, c]] * (1.0 - wx) + image[[y1, x1, c]] * wx;
                out.push(top * (1.0 - wy) + bottom * wy);
            }
        }
    }

    Ok(out)
}

/// Source neighbours and blend weight for output pixel `out`, aligning
/// pixel centres.
fn sample_coord(out: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let last = (len - 1) as f32;
    let src = ((out as f32 + 0.5) * scale - 0.5).clamp(0.0, last);
    let lo = src.floor();
    let hi = (lo + 1.0).min(last);
    (lo as usize, hi as usize, src - lo)
}

/// Mirrors an out-of-range index back into `0..len` without repeating the
/// edge sample.
fn mirror(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let i = index.rem_euclid(period);
    if i < len as isize {
        i as usize
    } else {
        (period - i) as usize
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f32 / sigma).powi(2)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

fn blur_axis(image: Array3<f32>, axis: usize, sigma: f32) -> Array3<f32> {
    if sigma <= 0.0 {
        return image;
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let (height, width, _) = image.dim();
    let len = if axis == 0 { height } else { width };

    Array3::from_shape_fn(image.dim(), |(y, x, c)| {
        let center = (if axis == 0 { y } else { x }) as isize;
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let i = mirror(center + k as isize - radius, len);
                let value = if axis == 0 {
                    image[[i, x, c]]
                } else {
                    image[[y, i, c]]
                };
                w * value
            })
            .sum()
    })
}
