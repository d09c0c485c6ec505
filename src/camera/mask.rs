use std::path::Path;

use opencv::core::{Mat, CV_32S};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

use crate::spots::{ComponentStats, ConnectedComponents};

use super::CaptureError;

const CONNECTIVITY: i32 = 4;

/// Labels the white areas of a binary mask and returns their bounding boxes.
pub fn load_components(path: &Path) -> Result<ConnectedComponents, CaptureError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CaptureError::MaskUnreadable(path.to_path_buf()))?;

    let mask = imgcodecs::imread(path_str, imgcodecs::IMREAD_GRAYSCALE)?;
    if mask.empty() {
        return Err(CaptureError::MaskUnreadable(path.to_path_buf()));
    }

    let mut labels = Mat::default();
    let mut stats = Mat::default();
    let mut centroids = Mat::default();
    let label_count = imgproc::connected_components_with_stats(
        &mask,
        &mut labels,
        &mut stats,
        &mut centroids,
        CONNECTIVITY,
        CV_32S,
    )?;

    let mut components = Vec::with_capacity(label_count.max(0) as usize);
    for label in 0..label_count {
        components.push(ComponentStats {
            left: *stats.at_2d::<i32>(label, imgproc::CC_STAT_LEFT)?,
            top: *stats.at_2d::<i32>(label, imgproc::CC_STAT_TOP)?,
            width: *stats.at_2d::<i32>(label, imgproc::CC_STAT_WIDTH)?,
            height: *stats.at_2d::<i32>(label, imgproc::CC_STAT_HEIGHT)?,
        });
    }

    tracing::debug!(path = %path.display(), labels = label_count, "labelled mask components");

    Ok(ConnectedComponents::new(components))
}
