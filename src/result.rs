use crate::angle::AngleSample;
use crate::scorer::{Compensation, FormScore};
use crate::signature::ExerciseType;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Movement speed characterization from mean angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoRating {
    /// Above 100 deg/s mean angular velocity
    Explosive,
    /// Between 50 and 100 deg/s
    Controlled,
    Slow,
}

impl TempoRating {
    pub fn from_velocity(mean_deg_per_sec: f64) -> Self {
        if mean_deg_per_sec > 100.0 {
            TempoRating::Explosive
        } else if mean_deg_per_sec > 50.0 {
            TempoRating::Controlled
        } else {
            TempoRating::Slow
        }
    }
}

/// Angular velocity statistics over the primary-joint sequence
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityStats {
    /// Mean absolute angular velocity in deg/s
    pub avg: f64,
    /// Peak absolute angular velocity in deg/s
    pub max: f64,
}

impl VelocityStats {
    /// Finite differences over adjacent samples. Samples with equal
    /// timestamps were rejected at intake, so the step is never zero.
    pub fn from_samples(samples: &[AngleSample]) -> Self {
        if samples.len() < 2 {
            return Self::default();
        }

        let mut sum = 0.0;
        let mut max = 0.0f64;
        let mut pairs = 0u32;

        for pair in samples.windows(2) {
            let dt = (pair[1].timestamp - pair[0].timestamp).as_secs_f64();
            if dt <= 0.0 {
                continue;
            }
            let velocity = (pair[1].degrees - pair[0].degrees).abs() / dt;
            sum += velocity;
            max = max.max(velocity);
            pairs += 1;
        }

        if pairs == 0 {
            return Self::default();
        }

        Self {
            avg: sum / pairs as f64,
            max,
        }
    }
}

/// Full analysis output for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub session_id: Uuid,
    pub exercise_type: ExerciseType,
    pub rep_count: u32,
    /// Form score in [0, 100]
    pub form_score: f64,
    pub deduction_summary: Vec<String>,
    pub compensations: Vec<Compensation>,
    /// Mean landmark visibility as a percentage
    pub confidence: f64,
    pub duration_seconds: f64,
    pub analyzed_frame_count: u64,
    pub total_frame_count: u64,
    pub avg_velocity: f64,
    pub max_velocity: f64,
    pub tempo: TempoRating,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(
        exercise_type: ExerciseType,
        rep_count: u32,
        form: FormScore,
        confidence: f64,
        duration_seconds: f64,
        analyzed_frame_count: u64,
        total_frame_count: u64,
        velocity: VelocityStats,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            exercise_type,
            rep_count,
            form_score: form.score,
            deduction_summary: form.deductions.into_iter().map(|d| d.reason).collect(),
            compensations: form.compensations,
            confidence,
            duration_seconds,
            analyzed_frame_count,
            total_frame_count,
            avg_velocity: velocity.avg,
            max_velocity: velocity.max,
            tempo: TempoRating::from_velocity(velocity.avg),
            completed_at: Utc::now(),
        }
    }
}

/// How a completed analysis should be interpreted.
///
/// `Degraded` carries a best-effort result produced from partial data
/// together with the reason it could not be computed in full; strict
/// mode turns those into `Failed` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Succeeded { result: AnalysisResult },
    Degraded { result: AnalysisResult, reason: String },
    Failed { reason: String },
}

impl AnalysisOutcome {
    /// The result when one was produced, full or degraded
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisOutcome::Succeeded { result } => Some(result),
            AnalysisOutcome::Degraded { result, .. } => Some(result),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::AngleKind;
    use std::time::Duration;

    fn samples(values: &[f64], step_ms: u64) -> Vec<AngleSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &degrees)| AngleSample {
                joint: AngleKind::Knee,
                degrees,
                timestamp: Duration::from_millis(step_ms * i as u64),
                confidence: 0.9,
            })
            .collect()
    }

    #[test]
    fn test_velocity_stats() {
        // 10 degrees per 100ms step: 100 deg/s throughout
        let s = samples(&[170.0, 160.0, 150.0, 140.0], 100);
        let v = VelocityStats::from_samples(&s);
        assert!((v.avg - 100.0).abs() < 1e-9);
        assert!((v.max - 100.0).abs() < 1e-9);

        assert_eq!(VelocityStats::from_samples(&s[..1]), VelocityStats::default());
    }

    #[test]
    fn test_tempo_rating() {
        assert_eq!(TempoRating::from_velocity(150.0), TempoRating::Explosive);
        assert_eq!(TempoRating::from_velocity(75.0), TempoRating::Controlled);
        assert_eq!(TempoRating::from_velocity(20.0), TempoRating::Slow);
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = AnalysisOutcome::Failed {
            reason: "no frames".to_string(),
        };
        assert!(failed.is_failed());
        assert!(failed.result().is_none());
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = AnalysisResult::new(
            ExerciseType::Squat,
            8,
            FormScore {
                score: 92.5,
                deductions: vec![],
                compensations: vec![],
            },
            87.0,
            45.2,
            440,
            452,
            VelocityStats { avg: 60.0, max: 130.0 },
        );

        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.tempo, TempoRating::Controlled);
    }

    #[test]
    fn test_outcome_serialization_tag() {
        let failed = AnalysisOutcome::Failed {
            reason: "no frames".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"reason\":\"no frames\""));
    }
}
