use opencv::core::Mat;
use opencv::prelude::*;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};
use thiserror::Error;

use crate::config::ModelConfig;

use super::keypoints::{self, DecodeError, KeypointSet};
use super::preprocess::{FramePreprocessor, InputEncoding, InputTensor, PreprocessError};

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("model has no {0}")]
    MissingTensor(&'static str),
    #[error("unsupported model input type: {0}")]
    UnsupportedInput(String),
    #[error("model output {0:?} missing from inference result")]
    MissingOutput(String),
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("decoding failed: {0}")]
    Decode(#[from] DecodeError),
}

impl EstimateError {
    /// Whether the error concerns this frame only and the loop may carry on.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            EstimateError::Decode(_)
                | EstimateError::Preprocess(PreprocessError::EmptyFrame)
                | EstimateError::Preprocess(PreprocessError::Channels(_))
                | EstimateError::Preprocess(PreprocessError::Depth(_))
        )
    }
}

/// Single-pose keypoint model running on ONNX Runtime.
pub struct PoseEstimator {
    session: Session,
    input_name: String,
    output_name: String,
    preprocessor: FramePreprocessor,
}

impl PoseEstimator {
    pub fn new(config: &ModelConfig) -> Result<Self, EstimateError> {
        let builder = Session::builder()
            .map_err(|e| EstimateError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EstimateError::ModelLoad(e.to_string()))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| EstimateError::ModelLoad(e.to_string()))?;

        let session = if config.path.starts_with("http://") || config.path.starts_with("https://") {
            builder.commit_from_url(&config.path)
        } else {
            builder.commit_from_file(&config.path)
        }
        .map_err(|e| EstimateError::ModelLoad(e.to_string()))?;

        let input = session
            .inputs()
            .first()
            .ok_or(EstimateError::MissingTensor("inputs"))?;
        let input_name = input.name().to_string();
        let encoding = input_encoding(input.dtype())?;

        let output_name = session
            .outputs()
            .first()
            .ok_or(EstimateError::MissingTensor("outputs"))?
            .name()
            .to_string();

        tracing::info!(
            path = %config.path,
            input = %input_name,
            output = %output_name,
            encoding = ?encoding,
            input_size = config.input_size,
            "loaded pose model"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            preprocessor: FramePreprocessor::new(config.input_size, encoding),
        })
    }

    /// Runs the model on a BGR camera frame and returns keypoints in that frame's pixels.
    pub fn estimate(&mut self, frame: &Mat) -> Result<KeypointSet, EstimateError> {
        let width = frame.cols().max(0) as u32;
        let height = frame.rows().max(0) as u32;

        let tensor = self.preprocessor.prepare(frame)?;
        let input = match &tensor {
            InputTensor::Int32(array) => TensorRef::from_array_view(array.view())?.into_dyn(),
            InputTensor::Float32(array) => TensorRef::from_array_view(array.view())?.into_dyn(),
        };

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])?;
        let raw = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| EstimateError::MissingOutput(self.output_name.clone()))?
            .try_extract_array::<f32>()?;

        Ok(keypoints::decode(raw, width, height)?)
    }
}

fn input_encoding(dtype: &ValueType) -> Result<InputEncoding, EstimateError> {
    match dtype {
        ValueType::Tensor { ty, .. } => encoding_for(*ty),
        other => Err(EstimateError::UnsupportedInput(format!("{other:?}"))),
    }
}

/// Integer inputs take raw bytes, float inputs take bytes scaled to `[0, 1]`.
fn encoding_for(ty: TensorElementType) -> Result<InputEncoding, EstimateError> {
    match ty {
        TensorElementType::Int32 => Ok(InputEncoding::Int32),
        TensorElementType::Float32 => Ok(InputEncoding::Float32),
        other => Err(EstimateError::UnsupportedInput(format!("{other:?}"))),
    }
}
