//! Joint angle geometry over decoded keypoints.

use super::keypoints::{BodyPart, KeypointSet};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.2;

const LEFT_ELBOW: (BodyPart, BodyPart, BodyPart) =
    (BodyPart::LeftShoulder, BodyPart::LeftElbow, BodyPart::LeftWrist);
const RIGHT_ELBOW: (BodyPart, BodyPart, BodyPart) =
    (BodyPart::RightShoulder, BodyPart::RightElbow, BodyPart::RightWrist);

#[derive(Debug, Clone, Copy)]
pub struct AngleEstimator {
    min_confidence: f32,
}

impl Default for AngleEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl AngleEstimator {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Interior angle at `b` in degrees, formed by the segments towards `a` and `c`.
    ///
    /// Returns `None` when any of the three keypoints is below the confidence
    /// floor (or NaN), or when `b` coincides with `a` or `c`.
    pub fn angle_at(&self, set: &KeypointSet, a: BodyPart, b: BodyPart, c: BodyPart) -> Option<f32> {
        let (ka, kb, kc) = (set[a], set[b], set[c]);
        if [ka, kb, kc]
            .iter()
            .any(|k| k.confidence.is_nan() || k.confidence < self.min_confidence)
        {
            return None;
        }

        let v1 = (ka.x - kb.x, ka.y - kb.y);
        let v2 = (kc.x - kb.x, kc.y - kb.y);

        let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
        let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
        if mag1 == 0.0 || mag2 == 0.0 {
            return None;
        }

        let dot = v1.0 * v2.0 + v1.1 * v2.1;
        let cos = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
        Some(cos.acos().to_degrees())
    }

    /// Mean of both elbow angles, or whichever side is measurable.
    pub fn elbow_angle(&self, set: &KeypointSet) -> Option<f32> {
        let left = self.angle_at(set, LEFT_ELBOW.0, LEFT_ELBOW.1, LEFT_ELBOW.2);
        let right = self.angle_at(set, RIGHT_ELBOW.0, RIGHT_ELBOW.1, RIGHT_ELBOW.2);

        match (left, right) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(angle), None) | (None, Some(angle)) => Some(angle),
            (None, None) => None,
        }
    }
}

/// Builds a pose whose elbows both bend at `degrees`, for exercising the
/// counter without a model.
#[cfg(test)]
pub(crate) fn pose_with_elbow_angle(degrees: f32) -> KeypointSet {
    use super::keypoints::Keypoint;

    let mut set = KeypointSet::default();
    let theta = degrees.to_radians();
    for (shoulder, elbow, wrist, origin_x) in [
        (LEFT_ELBOW.0, LEFT_ELBOW.1, LEFT_ELBOW.2, 200.0),
        (RIGHT_ELBOW.0, RIGHT_ELBOW.1, RIGHT_ELBOW.2, 400.0),
    ] {
        set.set(shoulder, Keypoint { y: 100.0, x: origin_x, confidence: 0.9 });
        set.set(elbow, Keypoint { y: 200.0, x: origin_x, confidence: 0.9 });
        set.set(
            wrist,
            Keypoint {
                y: 200.0 - 100.0 * theta.cos(),
                x: origin_x + 100.0 * theta.sin(),
                confidence: 0.9,
            },
        );
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoints::Keypoint;

    fn kp(y: f32, x: f32, confidence: f32) -> Keypoint {
        Keypoint { y, x, confidence }
    }

    fn left_arm(shoulder: Keypoint, elbow: Keypoint, wrist: Keypoint) -> KeypointSet {
        let mut set = KeypointSet::default();
        set.set(BodyPart::LeftShoulder, shoulder);
        set.set(BodyPart::LeftElbow, elbow);
        set.set(BodyPart::LeftWrist, wrist);
        set
    }

    fn left_angle(set: &KeypointSet) -> Option<f32> {
        AngleEstimator::default().angle_at(
            set,
            BodyPart::LeftShoulder,
            BodyPart::LeftElbow,
            BodyPart::LeftWrist,
        )
    }

    #[test]
    fn test_right_angle() {
        let set = left_arm(kp(0.0, 0.0, 1.0), kp(0.0, 1.0, 1.0), kp(1.0, 1.0, 1.0));
        let angle = left_angle(&set).unwrap();
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_straight_arm() {
        let set = left_arm(kp(0.0, 0.0, 1.0), kp(50.0, 0.0, 1.0), kp(100.0, 0.0, 1.0));
        let angle = left_angle(&set).unwrap();
        assert!((angle - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_low_confidence_is_undefined() {
        for low in 0..3 {
            let mut scores = [1.0, 1.0, 1.0];
            scores[low] = 0.19;
            let set = left_arm(
                kp(0.0, 0.0, scores[0]),
                kp(0.0, 1.0, scores[1]),
                kp(1.0, 1.0, scores[2]),
            );
            assert_eq!(left_angle(&set), None);
        }
    }

    #[test]
    fn test_nan_confidence_is_undefined() {
        let set = left_arm(kp(0.0, 0.0, f32::NAN), kp(0.0, 1.0, 1.0), kp(1.0, 1.0, 1.0));
        assert_eq!(left_angle(&set), None);
    }

    #[test]
    fn test_confidence_at_floor_is_accepted() {
        let set = left_arm(kp(0.0, 0.0, 0.2), kp(0.0, 1.0, 0.2), kp(1.0, 1.0, 0.2));
        assert!(left_angle(&set).is_some());
    }

    #[test]
    fn test_coincident_points_are_undefined() {
        let set = left_arm(kp(5.0, 5.0, 1.0), kp(5.0, 5.0, 1.0), kp(9.0, 5.0, 1.0));
        assert_eq!(left_angle(&set), None);

        let set = left_arm(kp(1.0, 5.0, 1.0), kp(5.0, 5.0, 1.0), kp(5.0, 5.0, 1.0));
        assert_eq!(left_angle(&set), None);
    }

    #[test]
    fn test_elbow_angle_averages_both_sides() {
        let mut set = pose_with_elbow_angle(90.0);
        set.set(BodyPart::RightWrist, kp(300.0, 400.0, 0.9));
        let combined = AngleEstimator::default().elbow_angle(&set).unwrap();
        assert!((combined - 135.0).abs() < 1e-2);
    }

    #[test]
    fn test_elbow_angle_falls_back_to_one_side() {
        let mut set = pose_with_elbow_angle(60.0);
        set.set(BodyPart::RightElbow, kp(0.0, 0.0, 0.05));
        let combined = AngleEstimator::default().elbow_angle(&set).unwrap();
        assert!((combined - 60.0).abs() < 1e-2);

        set.set(BodyPart::LeftWrist, kp(0.0, 0.0, 0.0));
        assert_eq!(AngleEstimator::default().elbow_angle(&set), None);
    }

    #[test]
    fn test_custom_confidence_floor() {
        let set = left_arm(kp(0.0, 0.0, 0.4), kp(0.0, 1.0, 0.4), kp(1.0, 1.0, 0.4));
        let strict = AngleEstimator::new(0.5);
        assert_eq!(
            strict.angle_at(&set, BodyPart::LeftShoulder, BodyPart::LeftElbow, BodyPart::LeftWrist),
            None
        );
    }
}
