use crate::angle::AngleKind;
use crate::config::ScorerConfig;
use crate::signature::ExerciseSignature;
use crate::smoothing::std_dev;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Minimum samples for a meaningful form score
pub const MIN_SCORE_SAMPLES: usize = 5;

/// Severity tiers for detected compensations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        f.write_str(label)
    }
}

/// Recognized compensation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationKind {
    /// Knees caving inward (bilateral knee angle mismatch)
    KneeValgus,
    /// One hip working higher than the other
    HipHiking,
    /// Uneven shoulder engagement
    ShoulderElevation,
    /// General left/right movement mismatch
    AsymmetricMovement,
}

impl CompensationKind {
    fn for_joint(joint: AngleKind) -> Self {
        match joint {
            AngleKind::Knee => CompensationKind::KneeValgus,
            AngleKind::Hip => CompensationKind::HipHiking,
            AngleKind::Shoulder => CompensationKind::ShoulderElevation,
            _ => CompensationKind::AsymmetricMovement,
        }
    }
}

/// A detected deviation from expected symmetric movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    #[serde(rename = "type")]
    pub kind: CompensationKind,
    pub severity: Severity,
    /// Joint where the compensation was observed
    pub location: AngleKind,
    /// Mean bilateral angle difference in degrees
    pub value: f64,
    /// Trigger threshold that was exceeded
    pub threshold: f64,
}

/// One scoring deduction, kept for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub reason: String,
    pub points: f64,
}

/// Form scoring result: a clamped 0-100 score plus its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormScore {
    pub score: f64,
    pub deductions: Vec<Deduction>,
    pub compensations: Vec<Compensation>,
}

impl FormScore {
    fn empty() -> Self {
        Self {
            score: 0.0,
            deductions: Vec::new(),
            compensations: Vec::new(),
        }
    }
}

/// Scores movement quality against biomechanically ideal angle windows.
///
/// Starts from 100 and deducts for depth and lockout deviations from the
/// signature's ideal intervals, inconsistent bottom positions, and
/// bilateral asymmetry compensations. The final score is clamped to a
/// configured floor so a rough session still reads as a score, not a
/// verdict.
#[derive(Debug, Clone)]
pub struct FormScorer {
    config: ScorerConfig,
}

impl FormScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score a session's primary-joint angle sequence.
    ///
    /// `asymmetry` carries the mean bilateral angle difference per joint
    /// for joints where both sides were observed. Sequences below the
    /// minimum sample count yield the zero result.
    pub fn score(
        &self,
        primary: &[f64],
        signature: Option<&ExerciseSignature>,
        asymmetry: &[(AngleKind, f64)],
    ) -> FormScore {
        if primary.len() < MIN_SCORE_SAMPLES {
            debug!(
                "Only {} samples, below scoring minimum {}; zero score",
                primary.len(),
                MIN_SCORE_SAMPLES
            );
            return FormScore::empty();
        }

        match signature {
            Some(sig) => self.score_with_signature(primary, sig, asymmetry),
            None => self.score_generic(primary, asymmetry),
        }
    }

    fn score_with_signature(
        &self,
        primary: &[f64],
        sig: &ExerciseSignature,
        asymmetry: &[(AngleKind, f64)],
    ) -> FormScore {
        let min_angle = primary.iter().copied().fold(f64::INFINITY, f64::min);
        let max_angle = primary.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut score = 100.0;
        let mut deductions = Vec::new();

        // Depth: distance of the session minimum from the ideal bottom window
        let depth_dev = sig.ideal_bottom.deviation(min_angle);
        if depth_dev > 0.0 {
            let points = (depth_dev * self.config.depth_per_degree).min(25.0);
            debug!(
                "Depth deviation {:.1} deg from ideal bottom, -{:.1}",
                depth_dev, points
            );
            deductions.push(Deduction {
                reason: format!("depth {:.1} deg outside ideal bottom window", depth_dev),
                points,
            });
            score -= points;
        }

        // Lockout: distance of the session maximum from the ideal top window
        let lockout_dev = sig.ideal_top.deviation(max_angle);
        if lockout_dev > 0.0 {
            let points = (lockout_dev * self.config.lockout_per_degree).min(20.0);
            debug!(
                "Lockout deviation {:.1} deg from ideal top, -{:.1}",
                lockout_dev, points
            );
            deductions.push(Deduction {
                reason: format!("lockout {:.1} deg short of ideal top window", lockout_dev),
                points,
            });
            score -= points;
        }

        // Consistency: repeated bottom positions should land near each other
        let bottom: Vec<f64> = primary
            .iter()
            .copied()
            .filter(|a| *a < sig.bottom_cutoff)
            .collect();
        if bottom.len() > 1 {
            let spread = std_dev(&bottom);
            if spread > sig.consistency_tolerance {
                debug!(
                    "Bottom-position spread {:.1} deg exceeds tolerance {:.1}, -{:.1}",
                    spread, sig.consistency_tolerance, self.config.consistency_penalty
                );
                deductions.push(Deduction {
                    reason: format!("inconsistent depth (spread {:.1} deg)", spread),
                    points: self.config.consistency_penalty,
                });
                score -= self.config.consistency_penalty;
            }
        }

        let compensations = self.detect_compensations(asymmetry, sig.asymmetry_trigger);
        for comp in &compensations {
            let points = self.severity_penalty(comp.severity);
            deductions.push(Deduction {
                reason: format!("{} {:?} at {}", comp.severity, comp.kind, comp.location.label()),
                points,
            });
            score -= points;
        }

        FormScore {
            score: score.clamp(self.config.floor, 100.0),
            deductions,
            compensations,
        }
    }

    /// ROM-tiered fallback when no signature is known
    fn score_generic(&self, primary: &[f64], asymmetry: &[(AngleKind, f64)]) -> FormScore {
        let min_angle = primary.iter().copied().fold(f64::INFINITY, f64::min);
        let max_angle = primary.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let rom = max_angle - min_angle;

        let mut score = if rom > 60.0 {
            95.0
        } else if rom > 45.0 {
            85.0
        } else if rom > 30.0 {
            75.0
        } else {
            60.0
        };

        let mut deductions = Vec::new();
        let compensations =
            self.detect_compensations(asymmetry, self.config.mild_threshold);
        for comp in &compensations {
            let points = self.severity_penalty(comp.severity);
            deductions.push(Deduction {
                reason: format!("{} {:?} at {}", comp.severity, comp.kind, comp.location.label()),
                points,
            });
            score -= points;
        }

        FormScore {
            score: score.clamp(self.config.floor, 100.0),
            deductions,
            compensations,
        }
    }

    fn detect_compensations(
        &self,
        asymmetry: &[(AngleKind, f64)],
        trigger: f64,
    ) -> Vec<Compensation> {
        let mut found = Vec::new();

        for (joint, gap) in asymmetry {
            if *gap <= trigger {
                continue;
            }
            let severity = self.severity_for(*gap);
            debug!(
                "{} bilateral gap {:.1} deg at {} (trigger {:.1})",
                severity,
                gap,
                joint.label(),
                trigger
            );
            found.push(Compensation {
                kind: CompensationKind::for_joint(*joint),
                severity,
                location: *joint,
                value: *gap,
                threshold: trigger,
            });
        }

        found
    }

    fn severity_for(&self, value: f64) -> Severity {
        if value >= self.config.severe_threshold {
            Severity::Severe
        } else if value >= self.config.moderate_threshold {
            Severity::Moderate
        } else {
            Severity::Mild
        }
    }

    fn severity_penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Mild => self.config.mild_penalty,
            Severity::Moderate => self.config.moderate_penalty,
            Severity::Severe => self.config.severe_penalty,
        }
    }
}
