use std::collections::BTreeSet;

use ndarray::ArrayView3;

use crate::camera::Frame;
use crate::spots::SpotRegion;

pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 2.0;

/// Flags spots whose brightness changed much more than their peers since
/// the previous sample.
///
/// Each spot contributes one scalar, the absolute difference of its mean
/// pixel intensity between the two frames. A spot is flagged when the
/// z-score of that scalar within the current sample exceeds the threshold,
/// so lighting drift that moves every spot together is ignored.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    threshold: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_Z_SCORE_THRESHOLD)
    }
}

impl ChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Indices of spots that need reclassifying, in ascending order.
    ///
    /// Without a previous sample every spot is returned.
    pub fn flag_changed_spots(
        &self,
        current: &Frame,
        previous: Option<&Frame>,
        regions: &[SpotRegion],
    ) -> BTreeSet<usize> {
        let Some(previous) = previous else {
            return (0..regions.len()).collect();
        };

        let diffs = spot_diffs(current, previous, regions);
        let Some(scores) = z_scores(&diffs) else {
            if !diffs.is_empty() {
                tracing::trace!(spots = diffs.len(), "uniform spot diffs, nothing stands out");
            }
            return BTreeSet::new();
        };

        scores
            .iter()
            .enumerate()
            .filter(|(index, z)| {
                tracing::trace!(spot = index, diff = diffs[*index], z = **z, "spot diff");
                z.abs() > self.threshold
            })
            .map(|(index, _)| index)
            .collect()
    }
}

/// Mean of all channel values in a crop.
pub fn mean_intensity(crop: &ArrayView3<u8>) -> f64 {
    if crop.is_empty() {
        return 0.0;
    }
    let sum: u64 = crop.iter().map(|&v| v as u64).sum();
    sum as f64 / crop.len() as f64
}

/// Absolute change of mean intensity per spot between two frames.
pub fn spot_diffs(current: &Frame, previous: &Frame, regions: &[SpotRegion]) -> Vec<f64> {
    regions
        .iter()
        .map(|region| {
            let now = mean_intensity(&current.crop(region));
            let before = mean_intensity(&previous.crop(region));
            (now - before).abs()
        })
        .collect()
}

/// Standard scores against the population mean and standard deviation.
///
/// Returns `None` when the population has no spread, which includes the
/// empty and single-element cases.
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }

    Some(values.iter().map(|v| (v - mean) / std_dev).collect())
}
