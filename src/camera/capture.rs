use std::path::{Path, PathBuf};

use ndarray::Array3;
use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::{CaptureError, Frame, FrameSize, FrameSource, CHANNELS};

/// Reads frames from a video file with OpenCV, converting BGR to RGB.
pub struct VideoFileSource {
    path: PathBuf,
    capture: VideoCapture,
    frame_size: FrameSize,
    bgr: Mat,
    rgb: Mat,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| CaptureError::NotOpened(path.to_path_buf()))?;

        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CaptureError::NotOpened(path.to_path_buf()));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let frame_size = FrameSize::new(width, height);

        tracing::info!(path = %path.display(), size = %frame_size, "opened video source");

        Ok(Self {
            path: path.to_path_buf(),
            capture,
            frame_size,
            bgr: Mat::default(),
            rgb: Mat::default(),
        })
    }
}

impl FrameSource for VideoFileSource {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.capture.read(&mut self.bgr)? || self.bgr.empty() {
            tracing::debug!(path = %self.path.display(), "video source exhausted");
            return Ok(None);
        }

        imgproc::cvt_color(&self.bgr, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let rows = self.rgb.rows() as usize;
        let cols = self.rgb.cols() as usize;
        let data = if self.rgb.is_continuous() {
            self.rgb.data_bytes()?.to_vec()
        } else {
            self.rgb.try_clone()?.data_bytes()?.to_vec()
        };

        let pixels = Array3::from_shape_vec((rows, cols, CHANNELS), data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        Frame::new(pixels).map(Some)
    }
}
