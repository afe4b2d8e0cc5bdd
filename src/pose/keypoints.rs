use std::ops::Index;

use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use thiserror::Error;

pub const NUM_KEYPOINTS: usize = 17;
/// Per-keypoint fields in the model output: y, x, score.
pub const KEYPOINT_FIELDS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unsupported output rank {0}, expected at least 2")]
    UnsupportedRank(usize),
    #[error("output shape {0:?} does not end in [17, 3]")]
    Shape(Vec<usize>),
    #[error("output has an empty batch or person dimension: {0:?}")]
    Empty(Vec<usize>),
}

/// Body landmarks in the pose model's training order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// Limbs drawn by the overlay.
pub const SKELETON: [(BodyPart, BodyPart); 12] = [
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftElbow),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::RightShoulder, BodyPart::RightElbow),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
];

/// A detected landmark in camera-frame pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Keypoint {
    pub y: f32,
    pub x: f32,
    pub confidence: f32,
}

/// The 17 keypoints of a single pose, indexed by [`BodyPart`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointSet {
    points: [Keypoint; NUM_KEYPOINTS],
}

impl KeypointSet {
    pub fn new(points: [Keypoint; NUM_KEYPOINTS]) -> Self {
        Self { points }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.points.iter()
    }

    #[cfg(test)]
    pub fn set(&mut self, part: BodyPart, keypoint: Keypoint) {
        self.points[part as usize] = keypoint;
    }
}

impl Index<BodyPart> for KeypointSet {
    type Output = Keypoint;

    fn index(&self, part: BodyPart) -> &Keypoint {
        &self.points[part as usize]
    }
}

/// Strips leading batch/person axes, keeping the first entry of each, so
/// every supported output layout becomes the single pose's `[17, 3]` array.
pub fn normalize_rank(raw: ArrayViewD<'_, f32>) -> Result<ArrayView2<'_, f32>, DecodeError> {
    let shape = raw.shape().to_vec();
    let rank = shape.len();
    if rank < 2 {
        return Err(DecodeError::UnsupportedRank(rank));
    }
    if shape[rank - 2] != NUM_KEYPOINTS || shape[rank - 1] != KEYPOINT_FIELDS {
        return Err(DecodeError::Shape(shape));
    }
    if shape[..rank - 2].contains(&0) {
        return Err(DecodeError::Empty(shape));
    }

    let mut view = raw;
    while view.ndim() > 2 {
        view = view.index_axis_move(Axis(0), 0);
    }
    view.into_dimensionality::<Ix2>()
        .map_err(|_| DecodeError::Shape(shape))
}

/// Decodes raw model output into keypoints scaled to the camera frame.
///
/// Coordinates in the output are normalized to the model input, which is a
/// plain stretch of the camera frame, so each axis scales independently.
pub fn decode(
    raw: ArrayViewD<'_, f32>,
    frame_width: u32,
    frame_height: u32,
) -> Result<KeypointSet, DecodeError> {
    let pose = normalize_rank(raw)?;
    let mut points = [Keypoint::default(); NUM_KEYPOINTS];

    for (point, row) in points.iter_mut().zip(pose.outer_iter()) {
        *point = Keypoint {
            y: row[0] * frame_height as f32,
            x: row[1] * frame_width as f32,
            confidence: row[2],
        };
    }

    Ok(KeypointSet::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, IxDyn};

    fn sample_pose() -> Array2<f32> {
        Array2::from_shape_fn((NUM_KEYPOINTS, KEYPOINT_FIELDS), |(i, j)| match j {
            0 => i as f32 / 20.0,
            1 => 1.0 - i as f32 / 20.0,
            _ => 0.05 * i as f32,
        })
    }

    #[test]
    fn test_scales_to_frame_pixels() {
        let pose = sample_pose();
        let set = decode(pose.view().into_dyn(), 640, 480).unwrap();

        let wrist = set[BodyPart::LeftWrist];
        assert!((wrist.y - 9.0 / 20.0 * 480.0).abs() < 1e-4);
        assert!((wrist.x - (1.0 - 9.0 / 20.0) * 640.0).abs() < 1e-4);
        assert!((wrist.confidence - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_rank_variants_decode_identically() {
        let pose = sample_pose();
        let flat: Vec<f32> = pose.iter().copied().collect();

        let rank2 = decode(pose.view().into_dyn(), 640, 480).unwrap();

        let rank3 = ndarray::ArrayD::from_shape_vec(IxDyn(&[1, 17, 3]), flat.clone()).unwrap();
        let rank3 = decode(rank3.view(), 640, 480).unwrap();

        let rank4 = ndarray::ArrayD::from_shape_vec(IxDyn(&[1, 1, 17, 3]), flat).unwrap();
        let rank4 = decode(rank4.view(), 640, 480).unwrap();

        assert_eq!(rank2, rank3);
        assert_eq!(rank2, rank4);
    }

    #[test]
    fn test_takes_first_batch_and_person() {
        let first = sample_pose();
        let mut data: Vec<f32> = first.iter().copied().collect();
        data.extend(std::iter::repeat(0.9).take(NUM_KEYPOINTS * KEYPOINT_FIELDS * 3));
        let raw = ndarray::ArrayD::from_shape_vec(IxDyn(&[2, 2, 17, 3]), data).unwrap();

        let set = decode(raw.view(), 100, 100).unwrap();
        let expected = decode(first.view().into_dyn(), 100, 100).unwrap();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_rejects_wrong_trailing_shape() {
        let raw = ndarray::ArrayD::<f32>::zeros(IxDyn(&[1, 1, 6, 56]));
        assert_eq!(
            decode(raw.view(), 640, 480).unwrap_err(),
            DecodeError::Shape(vec![1, 1, 6, 56])
        );

        let raw = ndarray::ArrayD::<f32>::zeros(IxDyn(&[1, 17, 2]));
        assert!(matches!(
            decode(raw.view(), 640, 480),
            Err(DecodeError::Shape(_))
        ));
    }

    #[test]
    fn test_extra_leading_axes_decode_like_rank2() {
        let pose = sample_pose();
        let flat: Vec<f32> = pose.iter().copied().collect();
        let rank5 = ndarray::ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 17, 3]), flat).unwrap();

        assert_eq!(
            decode(rank5.view(), 640, 480).unwrap(),
            decode(pose.view().into_dyn(), 640, 480).unwrap()
        );
    }

    #[test]
    fn test_rejects_rank1_and_empty_batch() {
        let raw = ndarray::ArrayD::<f32>::zeros(IxDyn(&[51]));
        assert_eq!(
            decode(raw.view(), 640, 480).unwrap_err(),
            DecodeError::UnsupportedRank(1)
        );

        let raw = ndarray::ArrayD::<f32>::zeros(IxDyn(&[0, 17, 3]));
        assert!(matches!(
            decode(raw.view(), 640, 480),
            Err(DecodeError::Empty(_))
        ));

        let raw = ndarray::ArrayD::<f32>::zeros(IxDyn(&[1, 0, 1, 17, 3]));
        assert!(matches!(
            decode(raw.view(), 640, 480),
            Err(DecodeError::Empty(_))
        ));
    }
}
