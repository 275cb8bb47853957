use crate::angle::AngleKind;
use crate::config::ClassifierConfig;
use crate::signature::{ExerciseSignature, ExerciseType};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Points for an observed ROM inside the signature's expected interval
const FULL_CREDIT: u32 = 3;
/// Points for an observed ROM within the tolerance band of the interval
const PARTIAL_CREDIT: u32 = 1;

/// Observed angle extremes for one joint across a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RomStats {
    pub min: f64,
    pub max: f64,
}

impl RomStats {
    pub fn rom(&self) -> f64 {
        self.max - self.min
    }
}

/// Per-joint ROM summary, the sole input to classification.
///
/// Tagged fields per joint rather than a string-keyed map; absent joints
/// simply were not observed with enough confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RomSummary {
    pub shoulder: Option<RomStats>,
    pub elbow: Option<RomStats>,
    pub hip: Option<RomStats>,
    pub knee: Option<RomStats>,
    pub ankle: Option<RomStats>,
}

impl RomSummary {
    pub fn get(&self, kind: AngleKind) -> Option<RomStats> {
        match kind {
            AngleKind::Shoulder => self.shoulder,
            AngleKind::Elbow => self.elbow,
            AngleKind::Hip => self.hip,
            AngleKind::Knee => self.knee,
            AngleKind::Ankle => self.ankle,
        }
    }

    pub fn set(&mut self, kind: AngleKind, stats: RomStats) {
        let slot = match kind {
            AngleKind::Shoulder => &mut self.shoulder,
            AngleKind::Elbow => &mut self.elbow,
            AngleKind::Hip => &mut self.hip,
            AngleKind::Knee => &mut self.knee,
            AngleKind::Ankle => &mut self.ankle,
        };
        *slot = Some(stats);
    }

    /// Observed range of motion for a joint, zero when unobserved
    pub fn rom(&self, kind: AngleKind) -> f64 {
        self.get(kind).map(|s| s.rom()).unwrap_or(0.0)
    }

    /// Joint with the largest observed ROM, if any movement was seen
    pub fn dominant_joint(&self) -> Option<AngleKind> {
        AngleKind::ALL
            .iter()
            .copied()
            .filter(|k| self.get(*k).is_some())
            .max_by(|a, b| {
                self.rom(*a)
                    .partial_cmp(&self.rom(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Outcome of signature matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub exercise: ExerciseType,
    pub score: u32,
    pub available: u32,
    /// Match quality as a percentage of available points
    pub confidence: f64,
}

impl Classification {
    fn unclassified(score: u32, available: u32) -> Self {
        Self {
            exercise: ExerciseType::General,
            score,
            available,
            confidence: percentage(score, available),
        }
    }
}

fn percentage(score: u32, available: u32) -> f64 {
    if available == 0 {
        0.0
    } else {
        score as f64 / available as f64 * 100.0
    }
}

/// Determines exercise type from ROM signatures.
///
/// A pure function of the ROM summary: the same summary always yields
/// the same classification, independent of call order or prior sessions.
#[derive(Debug, Clone)]
pub struct ExerciseClassifier {
    config: ClassifierConfig,
    signatures: Vec<ExerciseSignature>,
}

impl ExerciseClassifier {
    pub fn new(config: ClassifierConfig, signatures: Vec<ExerciseSignature>) -> Self {
        Self { config, signatures }
    }

    pub fn signatures(&self) -> &[ExerciseSignature] {
        &self.signatures
    }

    pub fn classify(&self, summary: &RomSummary) -> Classification {
        let dominant_rom = AngleKind::ALL
            .iter()
            .map(|k| summary.rom(*k))
            .fold(0.0f64, f64::max);

        if dominant_rom < self.config.min_rom {
            debug!(
                "No significant movement: dominant ROM {:.1} below {:.1} deg",
                dominant_rom, self.config.min_rom
            );
            return Classification::unclassified(0, 0);
        }

        if self.signatures.is_empty() {
            return Classification::unclassified(0, 0);
        }

        let mut scored: Vec<(u32, u32, &ExerciseSignature)> = self
            .signatures
            .iter()
            .map(|sig| {
                let (score, available) = self.score_signature(sig, summary);
                debug!(
                    "Signature {}: {}/{} points",
                    sig.exercise, score, available
                );
                (score, available, sig)
            })
            .collect();

        // Highest score first; stable across calls because the
        // signature table order is fixed
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let (best_score, best_available, _) = scored[0];
        if (best_score as f64) < best_available as f64 * self.config.min_score_fraction {
            debug!(
                "Best score {}/{} below confidence floor; reporting general",
                best_score, best_available
            );
            return Classification::unclassified(best_score, best_available);
        }

        let tied: Vec<&ExerciseSignature> = scored
            .iter()
            .filter(|(score, _, _)| *score == best_score)
            .map(|(_, _, sig)| *sig)
            .collect();

        let winner = self.break_tie(&tied, summary);

        Classification {
            exercise: winner.exercise,
            score: best_score,
            available: best_available,
            confidence: percentage(best_score, best_available),
        }
    }

    fn score_signature(&self, sig: &ExerciseSignature, summary: &RomSummary) -> (u32, u32) {
        let mut score = 0u32;
        let available = FULL_CREDIT * sig.expected_rom.len() as u32;

        for expected in &sig.expected_rom {
            // A joint that was never observed confirms nothing
            let Some(stats) = summary.get(expected.joint) else {
                continue;
            };
            let observed = stats.rom();
            if expected.interval.contains(observed) {
                score += FULL_CREDIT;
            } else if (observed - expected.interval.midpoint()).abs() < self.config.tolerance_band
            {
                score += PARTIAL_CREDIT;
            }
        }

        (score, available)
    }

    /// Prefer the signature whose primary joint shows the larger observed
    /// ROM. Hip-dominant and knee-dominant lower-body movements share
    /// secondary ranges, so those are separated by the hip-to-knee ROM
    /// ratio instead.
    fn break_tie<'a>(
        &self,
        tied: &[&'a ExerciseSignature],
        summary: &RomSummary,
    ) -> &'a ExerciseSignature {
        if tied.len() == 1 {
            return tied[0];
        }

        let squat = tied.iter().find(|s| s.exercise == ExerciseType::Squat);
        let deadlift = tied.iter().find(|s| s.exercise == ExerciseType::Deadlift);
        if let (Some(squat), Some(deadlift)) = (squat, deadlift) {
            let hip = summary.rom(AngleKind::Hip);
            let knee = summary.rom(AngleKind::Knee);
            let ratio = hip / (knee + 1.0);
            debug!("Hip/knee ROM ratio {:.2} for lower-body tie-break", ratio);
            return if ratio > self.config.hip_knee_ratio {
                deadlift
            } else {
                squat
            };
        }

        // Strictly-greater comparison keeps the earlier table entry on a
        // dead tie, so classification stays order-independent of input
        let mut best = tied[0];
        for sig in &tied[1..] {
            if summary.rom(sig.primary_joint) > summary.rom(best.primary_joint) {
                best = sig;
            }
        }
        best
    }
}
