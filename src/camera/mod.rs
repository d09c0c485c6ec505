#[cfg(feature = "opencv")]
mod capture;
mod frame;
#[cfg(feature = "opencv")]
mod mask;

use std::path::PathBuf;

use thiserror::Error;

#[cfg(feature = "opencv")]
pub use capture::VideoFileSource;
pub use frame::{Frame, FrameSize, CHANNELS};
#[cfg(feature = "opencv")]
pub use mask::load_components;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not open video source {0}")]
    NotOpened(PathBuf),
    #[error("mask image {0} is missing or unreadable")]
    MaskUnreadable(PathBuf),
    #[error("expected 3 color channels, got {0}")]
    Channels(usize),
    #[cfg(feature = "opencv")]
    #[error("opencv error: {0}")]
    Opencv(#[from] opencv::Error),
}

/// A sequence of frames in presentation order.
pub trait FrameSource {
    /// Dimensions every frame from this source will have.
    fn frame_size(&self) -> FrameSize;

    /// Returns `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}
