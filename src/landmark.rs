use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body side for paired joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Named anatomical points delivered by the external pose estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointName {
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
    LeftHeel,
    RightHeel,
}

impl JointName {
    /// Body side of this joint
    pub fn side(&self) -> Side {
        match self {
            JointName::LeftShoulder
            | JointName::LeftElbow
            | JointName::LeftWrist
            | JointName::LeftHip
            | JointName::LeftKnee
            | JointName::LeftAnkle
            | JointName::LeftHeel => Side::Left,
            _ => Side::Right,
        }
    }
}

/// A single pose landmark: position plus detector visibility confidence.
///
/// Produced by the external pose-estimation collaborator and immutable
/// once attached to a frame. Coordinates are in the estimator's
/// normalized space; `visibility` is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: JointName,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

impl Landmark {
    pub fn new(name: JointName, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            name,
            x,
            y,
            z,
            visibility,
        }
    }

    /// Position as an (x, y, z) triple
    pub fn position(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

/// One sampled instant of landmarks, timestamped relative to session start.
///
/// Frames are appended to a session in strictly increasing timestamp
/// order and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic frame identifier within the session
    pub index: u64,
    /// Offset from session start
    pub timestamp: Duration,
    /// Landmarks observed in this frame
    pub landmarks: Vec<Landmark>,
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, landmarks: Vec<Landmark>) -> Self {
        Self {
            index,
            timestamp,
            landmarks,
        }
    }

    /// Look up a landmark by joint name
    pub fn landmark(&self, name: JointName) -> Option<&Landmark> {
        self.landmarks.iter().find(|lm| lm.name == name)
    }

    /// Mean visibility across all landmarks in the frame
    pub fn mean_visibility(&self) -> f64 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.landmarks.iter().map(|lm| lm.visibility).sum();
        sum / self.landmarks.len() as f64
    }

    /// Whether the frame's landmarks clear the visibility floor on
    /// average. A single confident landmark among mostly-occluded ones
    /// is not enough; those frames are dropped at the session boundary
    /// rather than silently treated as full-confidence detections.
    pub fn is_reliable(&self, visibility_floor: f64) -> bool {
        !self.landmarks.is_empty() && self.mean_visibility() >= visibility_floor
    }
}
