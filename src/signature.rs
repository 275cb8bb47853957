use crate::angle::AngleKind;
use crate::counter::Thresholds;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported exercise classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Deadlift,
    PushUp,
    BicepCurl,
    Lunge,
    /// Fallback when no signature matches confidently
    General,
}

impl ExerciseType {
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Deadlift => "deadlift",
            ExerciseType::PushUp => "push_up",
            ExerciseType::BicepCurl => "bicep_curl",
            ExerciseType::Lunge => "lunge",
            ExerciseType::General => "general",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "squat" => Ok(ExerciseType::Squat),
            "deadlift" => Ok(ExerciseType::Deadlift),
            "push_up" | "pushup" => Ok(ExerciseType::PushUp),
            "bicep_curl" | "curl" => Ok(ExerciseType::BicepCurl),
            "lunge" => Ok(ExerciseType::Lunge),
            "general" => Ok(ExerciseType::General),
            other => Err(format!("unknown exercise type: {}", other)),
        }
    }
}

/// Closed angle interval in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RomInterval {
    pub min: f64,
    pub max: f64,
}

impl RomInterval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Distance to the nearest bound; zero inside the interval
    pub fn deviation(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }
}

/// Expected range of motion for one tracked joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedRom {
    pub joint: AngleKind,
    pub interval: RomInterval,
}

/// Static reference configuration describing one exercise: expected ROM
/// intervals per tracked joint, the joint used for rep counting, and the
/// biomechanically ideal angle windows used for form scoring. Read-only
/// at runtime.
#[derive(Debug, Clone)]
pub struct ExerciseSignature {
    pub exercise: ExerciseType,
    pub expected_rom: Vec<ExpectedRom>,
    /// Joint whose angle sequence drives rep counting and scoring
    pub primary_joint: AngleKind,
    pub secondary_joint: Option<AngleKind>,
    /// Ideal angle window at the bottom of the movement (depth)
    pub ideal_bottom: RomInterval,
    /// Ideal angle window at the top of the movement (lockout/extension)
    pub ideal_top: RomInterval,
    /// Samples below this angle count as bottom-position samples for the
    /// consistency check
    pub bottom_cutoff: f64,
    /// Allowed standard deviation of bottom-position angles
    pub consistency_tolerance: f64,
    /// Bilateral angle difference that triggers an asymmetry compensation
    pub asymmetry_trigger: f64,
    /// Fixed counting thresholds; adaptive thresholds are derived from
    /// the session when absent
    pub fixed_thresholds: Option<Thresholds>,
    /// Minimum primary-joint ROM for the movement to count as this exercise
    pub min_rep_range: f64,
}

impl ExerciseSignature {
    pub fn expected_for(&self, joint: AngleKind) -> Option<RomInterval> {
        self.expected_rom
            .iter()
            .find(|e| e.joint == joint)
            .map(|e| e.interval)
    }
}

/// Built-in signature table. Values follow published ROM expectations
/// for the covered movements.
pub fn builtin_signatures() -> Vec<ExerciseSignature> {
    vec![
        ExerciseSignature {
            exercise: ExerciseType::Squat,
            expected_rom: vec![
                ExpectedRom {
                    joint: AngleKind::Hip,
                    interval: RomInterval::new(40.0, 100.0),
                },
                ExpectedRom {
                    joint: AngleKind::Knee,
                    interval: RomInterval::new(40.0, 110.0),
                },
            ],
            primary_joint: AngleKind::Knee,
            secondary_joint: Some(AngleKind::Hip),
            ideal_bottom: RomInterval::new(70.0, 95.0),
            ideal_top: RomInterval::new(160.0, 180.0),
            bottom_cutoff: 120.0,
            consistency_tolerance: 15.0,
            asymmetry_trigger: 15.0,
            fixed_thresholds: None,
            min_rep_range: 40.0,
        },
        ExerciseSignature {
            exercise: ExerciseType::Deadlift,
            expected_rom: vec![
                ExpectedRom {
                    joint: AngleKind::Hip,
                    interval: RomInterval::new(40.0, 90.0),
                },
                ExpectedRom {
                    joint: AngleKind::Knee,
                    interval: RomInterval::new(0.0, 40.0),
                },
            ],
            primary_joint: AngleKind::Hip,
            secondary_joint: Some(AngleKind::Knee),
            ideal_bottom: RomInterval::new(40.0, 80.0),
            ideal_top: RomInterval::new(150.0, 180.0),
            bottom_cutoff: 100.0,
            consistency_tolerance: 15.0,
            asymmetry_trigger: 10.0,
            fixed_thresholds: None,
            min_rep_range: 30.0,
        },
        ExerciseSignature {
            exercise: ExerciseType::PushUp,
            expected_rom: vec![
                ExpectedRom {
                    joint: AngleKind::Elbow,
                    interval: RomInterval::new(40.0, 140.0),
                },
                ExpectedRom {
                    joint: AngleKind::Shoulder,
                    interval: RomInterval::new(0.0, 40.0),
                },
            ],
            primary_joint: AngleKind::Elbow,
            secondary_joint: Some(AngleKind::Shoulder),
            ideal_bottom: RomInterval::new(75.0, 100.0),
            ideal_top: RomInterval::new(160.0, 180.0),
            bottom_cutoff: 120.0,
            consistency_tolerance: 15.0,
            asymmetry_trigger: 15.0,
            fixed_thresholds: None,
            min_rep_range: 40.0,
        },
        ExerciseSignature {
            exercise: ExerciseType::BicepCurl,
            expected_rom: vec![
                ExpectedRom {
                    joint: AngleKind::Elbow,
                    interval: RomInterval::new(80.0, 160.0),
                },
                ExpectedRom {
                    joint: AngleKind::Shoulder,
                    interval: RomInterval::new(0.0, 15.0),
                },
            ],
            primary_joint: AngleKind::Elbow,
            secondary_joint: Some(AngleKind::Shoulder),
            // Peak contraction window; the elbow angle is smallest at
            // the top of a curl
            ideal_bottom: RomInterval::new(30.0, 50.0),
            ideal_top: RomInterval::new(160.0, 180.0),
            bottom_cutoff: 70.0,
            consistency_tolerance: 12.0,
            asymmetry_trigger: 15.0,
            fixed_thresholds: Some(Thresholds::new(50.0, 150.0)),
            min_rep_range: 80.0,
        },
        ExerciseSignature {
            exercise: ExerciseType::Lunge,
            expected_rom: vec![
                ExpectedRom {
                    joint: AngleKind::Knee,
                    interval: RomInterval::new(25.0, 100.0),
                },
                ExpectedRom {
                    joint: AngleKind::Hip,
                    interval: RomInterval::new(20.0, 60.0),
                },
            ],
            primary_joint: AngleKind::Knee,
            secondary_joint: Some(AngleKind::Hip),
            ideal_bottom: RomInterval::new(85.0, 95.0),
            ideal_top: RomInterval::new(160.0, 180.0),
            bottom_cutoff: 120.0,
            consistency_tolerance: 15.0,
            asymmetry_trigger: 10.0,
            fixed_thresholds: None,
            min_rep_range: 25.0,
        },
    ]
}

/// Look up the built-in signature for an exercise type
pub fn signature_for(exercise: ExerciseType) -> Option<ExerciseSignature> {
    builtin_signatures()
        .into_iter()
        .find(|s| s.exercise == exercise)
}
