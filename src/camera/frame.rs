use std::fmt;

use ndarray::{s, Array3, ArrayView3};
use serde::Serialize;

use crate::spots::SpotRegion;

use super::CaptureError;

pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded RGB video frame, stored as `height x width x 3`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    pub fn new(pixels: Array3<u8>) -> Result<Self, CaptureError> {
        let channels = pixels.dim().2;
        if channels != CHANNELS {
            return Err(CaptureError::Channels(channels));
        }
        Ok(Self { pixels })
    }

    /// A frame where every pixel has the same color.
    pub fn uniform(size: FrameSize, rgb: [u8; 3]) -> Self {
        let pixels = Array3::from_shape_fn(
            (size.height as usize, size.width as usize, CHANNELS),
            |(_, _, c)| rgb[c],
        );
        Self { pixels }
    }

    pub fn size(&self) -> FrameSize {
        let (height, width, _) = self.pixels.dim();
        FrameSize::new(width as u32, height as u32)
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    /// Paints `region` with a single color. Used to script scenes.
    pub fn fill_region(&mut self, region: &SpotRegion, rgb: [u8; 3]) {
        let mut area = self.pixels.slice_mut(s![
            region.y as usize..region.bottom() as usize,
            region.x as usize..region.right() as usize,
            ..
        ]);
        for mut pixel in area.lanes_mut(ndarray::Axis(2)) {
            for (c, value) in pixel.iter_mut().enumerate() {
                *value = rgb[c];
            }
        }
    }

    /// Borrows the pixels under `region`.
    ///
    /// Panics if the region is not inside the frame; regions are checked
    /// against the frame size once, when the layout is built.
    pub fn crop(&self, region: &SpotRegion) -> ArrayView3<'_, u8> {
        self.pixels.slice(s![
            region.y as usize..region.bottom() as usize,
            region.x as usize..region.right() as usize,
            ..
        ])
    }
}
