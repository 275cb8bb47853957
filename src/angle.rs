use crate::landmark::{Frame, JointName, Landmark, Side};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Minimum vector magnitude below which an angle is considered degenerate
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Whether angles are computed in the image plane or in full 3D.
///
/// The two variants yield different values for the same joint (the z
/// component changes vector directions), so they are selectable by
/// configuration and must not be mixed within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleDimension {
    /// Ignore the z coordinate (image-plane angle)
    TwoD,
    /// Use all three coordinates
    ThreeD,
}

impl Default for AngleDimension {
    fn default() -> Self {
        AngleDimension::TwoD
    }
}

/// Joints at which an angle is measured (the vertex of the landmark triple)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleKind {
    Shoulder,
    Elbow,
    Hip,
    Knee,
    Ankle,
}

impl AngleKind {
    pub const ALL: [AngleKind; 5] = [
        AngleKind::Shoulder,
        AngleKind::Elbow,
        AngleKind::Hip,
        AngleKind::Knee,
        AngleKind::Ankle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AngleKind::Shoulder => "shoulder",
            AngleKind::Elbow => "elbow",
            AngleKind::Hip => "hip",
            AngleKind::Knee => "knee",
            AngleKind::Ankle => "ankle",
        }
    }

    /// Anatomical landmark triple (proximal, vertex, distal) for one side
    pub fn triple(&self, side: Side) -> (JointName, JointName, JointName) {
        use JointName::*;
        match (self, side) {
            (AngleKind::Knee, Side::Left) => (LeftHip, LeftKnee, LeftAnkle),
            (AngleKind::Knee, Side::Right) => (RightHip, RightKnee, RightAnkle),
            (AngleKind::Elbow, Side::Left) => (LeftShoulder, LeftElbow, LeftWrist),
            (AngleKind::Elbow, Side::Right) => (RightShoulder, RightElbow, RightWrist),
            (AngleKind::Hip, Side::Left) => (LeftShoulder, LeftHip, LeftKnee),
            (AngleKind::Hip, Side::Right) => (RightShoulder, RightHip, RightKnee),
            (AngleKind::Shoulder, Side::Left) => (LeftHip, LeftShoulder, LeftElbow),
            (AngleKind::Shoulder, Side::Right) => (RightHip, RightShoulder, RightElbow),
            (AngleKind::Ankle, Side::Left) => (LeftKnee, LeftAnkle, LeftHeel),
            (AngleKind::Ankle, Side::Right) => (RightKnee, RightAnkle, RightHeel),
        }
    }
}

/// One joint-angle measurement derived from a landmark triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub joint: AngleKind,
    /// Angle at the vertex, in [0, 180] degrees
    pub degrees: f64,
    /// Offset from session start
    pub timestamp: Duration,
    /// Minimum visibility of the contributing landmark triple
    pub confidence: f64,
}

/// Pure joint-angle computation from point triples
#[derive(Debug, Clone, Copy)]
pub struct AngleCalculator {
    dimension: AngleDimension,
    epsilon: f64,
}

impl AngleCalculator {
    pub fn new(dimension: AngleDimension, epsilon: f64) -> Self {
        Self { dimension, epsilon }
    }

    pub fn dimension(&self) -> AngleDimension {
        self.dimension
    }

    /// Angle at vertex `b` between vectors b→a and b→c, in degrees.
    ///
    /// Returns `None` when either vector's magnitude is below epsilon
    /// (degenerate triple); never NaN. The cosine is clamped to [-1, 1]
    /// before the inverse cosine so near-parallel vectors stay stable.
    pub fn angle_between(
        &self,
        a: (f64, f64, f64),
        b: (f64, f64, f64),
        c: (f64, f64, f64),
    ) -> Option<f64> {
        let (ax, ay, az) = a;
        let (bx, by, bz) = b;
        let (cx, cy, cz) = c;

        let z_scale = match self.dimension {
            AngleDimension::TwoD => 0.0,
            AngleDimension::ThreeD => 1.0,
        };

        let v1 = (ax - bx, ay - by, (az - bz) * z_scale);
        let v2 = (cx - bx, cy - by, (cz - bz) * z_scale);

        let mag1 = (v1.0 * v1.0 + v1.1 * v1.1 + v1.2 * v1.2).sqrt();
        let mag2 = (v2.0 * v2.0 + v2.1 * v2.1 + v2.2 * v2.2).sqrt();

        if mag1 < self.epsilon || mag2 < self.epsilon {
            return None;
        }

        let dot = v1.0 * v2.0 + v1.1 * v2.1 + v1.2 * v2.2;
        let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);

        Some(cos_angle.acos().to_degrees())
    }

    /// Angle for one side of a joint from a frame's landmarks.
    ///
    /// Returns the angle together with the triple's minimum visibility,
    /// or `None` when a landmark is missing or the triple is degenerate.
    pub fn joint_angle(&self, frame: &Frame, kind: AngleKind, side: Side) -> Option<(f64, f64)> {
        let (p, v, d) = kind.triple(side);
        let proximal = frame.landmark(p)?;
        let vertex = frame.landmark(v)?;
        let distal = frame.landmark(d)?;

        let degrees = self.angle_between(
            proximal.position(),
            vertex.position(),
            distal.position(),
        )?;

        let confidence = triple_confidence(proximal, vertex, distal);
        Some((degrees, confidence))
    }
}

fn triple_confidence(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    a.visibility.min(b.visibility).min(c.visibility)
}

/// Per-frame angle measurements for one joint kind
#[derive(Debug, Clone, Default)]
pub struct FrameAngles {
    pub left: Option<AngleSample>,
    pub right: Option<AngleSample>,
    /// Bilateral average when both sides are present, otherwise the
    /// available side
    pub combined: Option<AngleSample>,
}

/// Derives per-joint angle samples from raw frames
#[derive(Debug, Clone, Copy)]
pub struct AngleExtractor {
    calculator: AngleCalculator,
}

impl AngleExtractor {
    pub fn new(calculator: AngleCalculator) -> Self {
        Self { calculator }
    }

    /// Extract left/right/combined samples for one joint kind.
    ///
    /// Degenerate triples are dropped here (the invalid-sample sentinel
    /// policy): downstream smoothing and statistics never see them.
    pub fn extract(&self, frame: &Frame, kind: AngleKind) -> FrameAngles {
        let left = self
            .calculator
            .joint_angle(frame, kind, Side::Left)
            .map(|(degrees, confidence)| AngleSample {
                joint: kind,
                degrees,
                timestamp: frame.timestamp,
                confidence,
            });
        let right = self
            .calculator
            .joint_angle(frame, kind, Side::Right)
            .map(|(degrees, confidence)| AngleSample {
                joint: kind,
                degrees,
                timestamp: frame.timestamp,
                confidence,
            });

        let combined = match (left, right) {
            (Some(l), Some(r)) => Some(AngleSample {
                joint: kind,
                degrees: (l.degrees + r.degrees) / 2.0,
                timestamp: frame.timestamp,
                confidence: l.confidence.min(r.confidence),
            }),
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => {
                debug!("No {} angle available in frame {}", kind.label(), frame.index);
                None
            }
        };

        FrameAngles {
            left,
            right,
            combined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Landmark;

    fn calc_2d() -> AngleCalculator {
        AngleCalculator::new(AngleDimension::TwoD, DEGENERATE_EPSILON)
    }

    #[test]
    fn test_straight_line_is_180() {
        let angle = calc_2d()
            .angle_between((0.0, 0.0, 0.0), (0.5, 0.0, 0.0), (1.0, 0.0, 0.0))
            .unwrap();
        assert!((angle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_right_angle() {
        let angle = calc_2d()
            .angle_between((0.0, 0.0, 0.0), (0.5, 0.0, 0.0), (0.5, 0.5, 0.0))
            .unwrap();
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_triple_yields_sentinel() {
        // Vertex coincides with the proximal point: zero-length vector
        let result = calc_2d().angle_between(
            (0.5, 0.5, 0.0),
            (0.5, 0.5, 0.0),
            (1.0, 1.0, 0.0),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_output_range() {
        let calc = calc_2d();
        let points = [
            ((0.0, 0.0), (1.0, 0.0), (2.0, 0.1)),
            ((0.0, 1.0), (0.5, 0.0), (1.0, 1.0)),
            ((0.3, 0.7), (0.4, 0.2), (0.9, 0.9)),
            ((1.0, 0.0), (0.0, 0.0), (-1.0, 0.0001)),
        ];
        for (a, b, c) in points {
            let angle = calc
                .angle_between((a.0, a.1, 0.0), (b.0, b.1, 0.0), (c.0, c.1, 0.0))
                .unwrap();
            assert!((0.0..=180.0).contains(&angle), "angle {} out of range", angle);
            assert!(!angle.is_nan());
        }
    }

    #[test]
    fn test_2d_ignores_z() {
        let calc = calc_2d();
        let flat = calc
            .angle_between((0.0, 0.0, 0.0), (0.5, 0.0, 0.0), (1.0, 0.0, 0.0))
            .unwrap();
        let displaced = calc
            .angle_between((0.0, 0.0, 9.0), (0.5, 0.0, -3.0), (1.0, 0.0, 7.0))
            .unwrap();
        assert!((flat - displaced).abs() < 1e-9);
    }

    #[test]
    fn test_3d_uses_z() {
        let calc = AngleCalculator::new(AngleDimension::ThreeD, DEGENERATE_EPSILON);
        let flat = calc
            .angle_between((0.0, 0.0, 0.0), (0.5, 0.0, 0.0), (1.0, 0.0, 0.0))
            .unwrap();
        let bent = calc
            .angle_between((0.0, 0.0, 0.0), (0.5, 0.0, 0.0), (1.0, 0.0, 0.5))
            .unwrap();
        assert!((flat - 180.0).abs() < 1e-6);
        assert!(bent < 180.0 - 1.0);
    }

    #[test]
    fn test_extractor_combines_sides() {
        let frame = Frame::new(
            0,
            Duration::ZERO,
            vec![
                // Left leg straight
                Landmark::new(JointName::LeftHip, 0.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::LeftKnee, 0.0, 0.5, 0.0, 0.8),
                Landmark::new(JointName::LeftAnkle, 0.0, 1.0, 0.0, 0.7),
                // Right leg bent 90 degrees
                Landmark::new(JointName::RightHip, 1.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::RightKnee, 1.0, 0.5, 0.0, 0.9),
                Landmark::new(JointName::RightAnkle, 1.5, 0.5, 0.0, 0.9),
            ],
        );

        let extractor = AngleExtractor::new(calc_2d());
        let angles = extractor.extract(&frame, AngleKind::Knee);

        let left = angles.left.unwrap();
        let right = angles.right.unwrap();
        let combined = angles.combined.unwrap();

        assert!((left.degrees - 180.0).abs() < 1e-6);
        assert!((right.degrees - 90.0).abs() < 1e-6);
        assert!((combined.degrees - 135.0).abs() < 1e-6);
        // Confidence is the weakest landmark in either triple
        assert!((combined.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_extractor_missing_landmarks() {
        let frame = Frame::new(0, Duration::ZERO, vec![]);
        let extractor = AngleExtractor::new(calc_2d());
        let angles = extractor.extract(&frame, AngleKind::Elbow);
        assert!(angles.left.is_none());
        assert!(angles.right.is_none());
        assert!(angles.combined.is_none());
    }
}
