use ndarray::Array4;
use opencv::core::{Mat, Size, CV_8U};
use opencv::imgproc;
use opencv::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("empty frame")]
    EmptyFrame,
    #[error("expected a 3-channel frame, got {0} channel(s)")]
    Channels(i32),
    #[error("expected 8-bit pixels, got depth {0}")]
    Depth(i32),
    #[error("frame data too small: {got} bytes, expected {expected}")]
    TooSmall { got: usize, expected: usize },
    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Element encoding the model declares for its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEncoding {
    /// Raw `[0, 255]` channel values.
    Int32,
    /// Channel values scaled to `[0, 1]`.
    Float32,
}

/// `[1, S, S, 3]` RGB model input.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Int32(Array4<i32>),
    Float32(Array4<f32>),
}

#[derive(Debug, Clone, Copy)]
pub struct FramePreprocessor {
    size: u32,
    encoding: InputEncoding,
}

impl FramePreprocessor {
    pub fn new(size: u32, encoding: InputEncoding) -> Self {
        Self { size, encoding }
    }

    /// Stretches a BGR frame to `S×S` (no letterboxing) and packs it as NHWC RGB.
    pub fn prepare(&self, frame: &Mat) -> Result<InputTensor, PreprocessError> {
        if frame.empty() {
            return Err(PreprocessError::EmptyFrame);
        }
        if frame.channels() != 3 {
            return Err(PreprocessError::Channels(frame.channels()));
        }
        if frame.depth() != CV_8U {
            return Err(PreprocessError::Depth(frame.depth()));
        }

        let side = self.size as i32;
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(side, side),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let side = self.size as usize;
        let expected = side * side * 3;
        let data = rgb.data_bytes()?;
        if data.len() < expected {
            return Err(PreprocessError::TooSmall {
                got: data.len(),
                expected,
            });
        }
        let data = &data[..expected];

        let shape = (1, side, side, 3);
        let tensor = match self.encoding {
            InputEncoding::Int32 => InputTensor::Int32(Array4::from_shape_vec(
                shape,
                data.iter().map(|&b| b as i32).collect(),
            )?),
            InputEncoding::Float32 => InputTensor::Float32(Array4::from_shape_vec(
                shape,
                data.iter().map(|&b| b as f32 / 255.0).collect(),
            )?),
        };

        Ok(tensor)
    }
}
