use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::camera::FrameSize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("spot {index} ({region:?}) extends outside the {frame} frame")]
    OutOfBounds {
        index: usize,
        region: SpotRegion,
        frame: FrameSize,
    },
    #[error("spot {index} has zero width or height")]
    Degenerate { index: usize },
}

/// Bounding box of one connected component, as reported by the labeller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStats {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Result of labelling a mask. Label 0 is the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedComponents {
    pub label_count: usize,
    pub stats: Vec<ComponentStats>,
}

impl ConnectedComponents {
    pub fn new(stats: Vec<ComponentStats>) -> Self {
        Self {
            label_count: stats.len(),
            stats,
        }
    }
}

/// Axis-aligned rectangle in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpotRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SpotRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn fits(&self, frame: FrameSize) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= frame.width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= frame.height)
    }
}

impl From<ComponentStats> for SpotRegion {
    fn from(stats: ComponentStats) -> Self {
        let clamp = |v: i32| v.max(0) as u32;
        Self::new(
            clamp(stats.left),
            clamp(stats.top),
            clamp(stats.width),
            clamp(stats.height),
        )
    }
}

/// Turns mask labels 1..N into spot regions 0..N-1, dropping the background.
pub fn derive_regions(components: &ConnectedComponents) -> Vec<SpotRegion> {
    components
        .stats
        .iter()
        .take(components.label_count)
        .skip(1)
        .map(|&stats| SpotRegion::from(stats))
        .collect()
}

/// The fixed set of spots for a run, checked once against the frame size.
///
/// A spot's index is its position in the layout and never changes.
#[derive(Debug, Clone)]
pub struct SpotLayout {
    regions: Arc<[SpotRegion]>,
    frame_size: FrameSize,
}

impl SpotLayout {
    pub fn new(regions: Vec<SpotRegion>, frame_size: FrameSize) -> Result<Self, RegionError> {
        for (index, region) in regions.iter().enumerate() {
            if region.width == 0 || region.height == 0 {
                return Err(RegionError::Degenerate { index });
            }
            if !region.fits(frame_size) {
                return Err(RegionError::OutOfBounds {
                    index,
                    region: *region,
                    frame: frame_size,
                });
            }
        }

        Ok(Self {
            regions: regions.into(),
            frame_size,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SpotRegion> {
        self.regions.get(index)
    }

    pub fn regions(&self) -> &[SpotRegion] {
        &self.regions
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }
}
