use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use thiserror::Error;

use crate::config::CameraConfig;
use crate::pose::FrameSource;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("could not open video source {0}")]
    NotOpened(String),
    #[error("camera returned an empty frame")]
    EmptyFrame,
}

/// Where frames come from: a local device or a file/stream URL.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Device(i32),
    Url(String),
}

impl SourceKind {
    pub fn from_config(config: &CameraConfig) -> Self {
        match &config.url {
            Some(url) => SourceKind::Url(url.clone()),
            None => SourceKind::Device(config.device),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Device(index) => write!(f, "device {index}"),
            SourceKind::Url(url) => write!(f, "{url}"),
        }
    }
}

pub struct Camera {
    capture: VideoCapture,
    kind: SourceKind,
    width: u32,
    height: u32,
}

impl Camera {
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let kind = SourceKind::from_config(config);
        let mut capture = match &kind {
            SourceKind::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY)?,
            SourceKind::Url(url) => VideoCapture::from_file(url, videoio::CAP_ANY)?,
        };

        if !capture.is_opened()? {
            return Err(CaptureError::NotOpened(kind.to_string()));
        }

        if let Some(width) = config.width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        }
        if let Some(height) = config.height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        tracing::info!(source = %kind, width, height, "video source opened");

        Ok(Self {
            capture,
            kind,
            width,
            height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for Camera {
    type Frame = Mat;

    /// A failed read from a device is a skippable frame; from a file it is the end.
    fn next_frame(&mut self) -> Result<Option<Mat>, CaptureError> {
        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame)?;

        if !grabbed || frame.empty() {
            return match self.kind {
                SourceKind::Url(_) => Ok(None),
                SourceKind::Device(_) => Err(CaptureError::EmptyFrame),
            };
        }

        Ok(Some(frame))
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!(source = %self.kind, error = %e, "failed to release video source");
        }
    }
}
