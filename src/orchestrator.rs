use crate::angle::{AngleCalculator, AngleExtractor, AngleKind, AngleSample};
use crate::classifier::ExerciseClassifier;
use crate::config::RepscopeConfig;
use crate::counter::{estimate_cycles, RepetitionCounter, Thresholds};
use crate::error::{RepscopeError, Result};
use crate::landmark::Frame;
use crate::result::{AnalysisOutcome, AnalysisResult, VelocityStats};
use crate::scorer::FormScorer;
use crate::session::Session;
use crate::signature::{builtin_signatures, signature_for, ExerciseSignature, ExerciseType};
use crate::smoothing::SignalSmoother;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Anything that yields pose frames in temporal order
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` when the session is over
    async fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Runs the full analysis pipeline for one session: angle extraction,
/// smoothing, classification, rep counting, and form scoring.
///
/// The orchestrator itself is immutable; all per-session state lives in
/// a [`Session`], so one orchestrator can serve many sessions.
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    config: RepscopeConfig,
    smoother: SignalSmoother,
    classifier: ExerciseClassifier,
    scorer: FormScorer,
}

impl AnalysisOrchestrator {
    pub fn new(config: RepscopeConfig) -> Self {
        let smoother = SignalSmoother::new(
            config.smoothing.kind,
            config.smoothing.window,
            config.smoothing.outlier_sigma,
        );
        let classifier =
            ExerciseClassifier::new(config.classifier.clone(), builtin_signatures());
        let scorer = FormScorer::new(config.scorer.clone());

        Self {
            config,
            smoother,
            classifier,
            scorer,
        }
    }

    pub fn config(&self) -> &RepscopeConfig {
        &self.config
    }

    /// Fresh per-session context configured for this orchestrator
    pub fn new_session(&self) -> Session {
        let calculator =
            AngleCalculator::new(self.config.angle.dimension, self.config.angle.epsilon);
        Session::new(
            AngleExtractor::new(calculator),
            self.config.session.visibility_floor,
        )
    }

    /// Analyze a complete, in-memory frame sequence.
    ///
    /// `hint` pins the exercise type and skips classification.
    /// Malformed frames (out of temporal order, non-finite coordinates)
    /// are discarded with a warning and the outcome marked degraded;
    /// strict mode surfaces them as errors instead.
    pub fn analyze_frames(
        &self,
        frames: &[Frame],
        hint: Option<ExerciseType>,
    ) -> Result<AnalysisOutcome> {
        let mut session = self.new_session();
        let mut discarded = 0u64;
        for frame in frames {
            self.ingest(&mut session, frame, &mut discarded)?;
        }
        Ok(self.conclude(&session, hint, discarded))
    }

    /// Drain an async frame source to completion, then analyze
    pub async fn analyze_source(
        &self,
        source: &mut dyn FrameSource,
        hint: Option<ExerciseType>,
    ) -> Result<AnalysisOutcome> {
        let mut session = self.new_session();
        let mut discarded = 0u64;
        while let Some(frame) = source.next_frame().await? {
            self.ingest(&mut session, &frame, &mut discarded)?;
        }
        Ok(self.conclude(&session, hint, discarded))
    }

    /// Consume frames from a channel until the sender side closes,
    /// then analyze. This is the streaming entry point; producers stay
    /// decoupled from analysis through the channel.
    pub async fn run_stream(
        &self,
        mut frames: mpsc::Receiver<Frame>,
        hint: Option<ExerciseType>,
    ) -> Result<AnalysisOutcome> {
        let mut session = self.new_session();
        let mut discarded = 0u64;
        while let Some(frame) = frames.recv().await {
            self.ingest(&mut session, &frame, &mut discarded)?;
        }
        Ok(self.conclude(&session, hint, discarded))
    }

    /// Feed one frame, discarding malformed ones outside strict mode
    fn ingest(&self, session: &mut Session, frame: &Frame, discarded: &mut u64) -> Result<()> {
        match session.push_frame(frame) {
            Ok(_) => Ok(()),
            Err(err) if !self.config.session.strict => {
                warn!("Discarding frame {}: {}", frame.index, err);
                *discarded += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Finalize, folding intake discards into the outcome
    fn conclude(
        &self,
        session: &Session,
        hint: Option<ExerciseType>,
        discarded: u64,
    ) -> AnalysisOutcome {
        let outcome = self.finish(session, hint);
        if discarded == 0 {
            return outcome;
        }
        let note = format!("{} malformed frames discarded at intake", discarded);
        match outcome {
            AnalysisOutcome::Succeeded { result } => AnalysisOutcome::Degraded {
                result,
                reason: note,
            },
            AnalysisOutcome::Degraded { result, reason } => AnalysisOutcome::Degraded {
                result,
                reason: format!("{}; {}", reason, note),
            },
            failed => failed,
        }
    }

    /// Produce the final outcome for a fully fed session
    pub fn finish(&self, session: &Session, hint: Option<ExerciseType>) -> AnalysisOutcome {
        session.log_intake();

        if session.analyzed_frames() == 0 {
            return AnalysisOutcome::Failed {
                reason: "no analyzable frames in session".to_string(),
            };
        }

        let summary = session.rom_summary();

        // Exercise identity: an explicit hint wins, otherwise classify
        let exercise = match hint {
            Some(exercise) => {
                debug!("Exercise type pinned to {} by caller", exercise);
                exercise
            }
            None => {
                let classification = self.classifier.classify(&summary);
                info!(
                    "Classified as {} ({:.0}% signature match)",
                    classification.exercise, classification.confidence
                );
                classification.exercise
            }
        };
        let signature = signature_for(exercise);

        // Primary joint: the signature's counting joint when it was
        // observed, then its secondary joint, then whichever joint
        // moved the most
        let mut degraded_reason: Option<String> = None;
        let primary_joint = match &signature {
            Some(sig) if !session.series(sig.primary_joint).is_empty() => sig.primary_joint,
            Some(sig) => {
                let fallback = sig
                    .secondary_joint
                    .filter(|joint| !session.series(*joint).is_empty())
                    .or_else(|| summary.dominant_joint());
                match fallback {
                    Some(joint) => {
                        let reason = format!(
                            "primary joint for {} not observed, using {}",
                            exercise,
                            joint.label()
                        );
                        warn!("{}", reason);
                        degraded_reason = Some(reason);
                        joint
                    }
                    None => {
                        return AnalysisOutcome::Failed {
                            reason: "no joint angles could be derived from the session"
                                .to_string(),
                        };
                    }
                }
            }
            None => match summary.dominant_joint() {
                Some(joint) => joint,
                None => {
                    return AnalysisOutcome::Failed {
                        reason: "no joint angles could be derived from the session".to_string(),
                    };
                }
            },
        };

        let raw = session.series(primary_joint);
        let min_samples = self.config.counter.min_samples;
        if raw.len() < min_samples {
            let reason = RepscopeError::insufficient_data(
                "repetition analysis",
                min_samples,
                raw.len(),
            )
            .to_string();
            if self.config.session.strict {
                return AnalysisOutcome::Failed { reason };
            }
            warn!("{}; producing a degraded result", reason);
            degraded_reason.get_or_insert(reason);
        }

        let smoothed = self.smooth_series(raw);
        let rep_count = self.count_reps(&smoothed, signature.as_ref());
        let form = self.scorer.score(
            &degrees_of(&smoothed),
            signature.as_ref(),
            &session.asymmetry(),
        );
        let velocity = VelocityStats::from_samples(&smoothed);

        let result = AnalysisResult::new(
            exercise,
            rep_count,
            form,
            session.mean_visibility() * 100.0,
            session.duration().as_secs_f64(),
            session.analyzed_frames(),
            session.total_frames(),
            velocity,
        );

        info!(
            "Session {}: {} x{}, form {:.0}, confidence {:.0}%",
            result.session_id, result.exercise_type, result.rep_count, result.form_score,
            result.confidence
        );

        match degraded_reason {
            Some(reason) => AnalysisOutcome::Degraded { result, reason },
            None => AnalysisOutcome::Succeeded { result },
        }
    }

    fn smooth_series(&self, raw: &[AngleSample]) -> Vec<AngleSample> {
        let degrees: Vec<f64> = raw.iter().map(|s| s.degrees).collect();
        let smoothed = self.smoother.smooth(&degrees);
        raw.iter()
            .zip(smoothed)
            .map(|(sample, degrees)| AngleSample { degrees, ..*sample })
            .collect()
    }

    fn count_reps(&self, smoothed: &[AngleSample], signature: Option<&ExerciseSignature>) -> u32 {
        if smoothed.len() < self.config.counter.min_samples {
            return 0;
        }

        let degrees = degrees_of(smoothed);
        let min = degrees.iter().copied().fold(f64::INFINITY, f64::min);
        let max = degrees.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if let Some(sig) = signature {
            if max - min < sig.min_rep_range {
                debug!(
                    "Observed range {:.1} deg below {} rep range {:.1}; no reps",
                    max - min,
                    sig.exercise,
                    sig.min_rep_range
                );
                return 0;
            }
        }

        let thresholds = signature
            .and_then(|sig| sig.fixed_thresholds)
            .unwrap_or_else(|| {
                Thresholds::adaptive(
                    min,
                    max,
                    self.config.counter.adaptive_low_fraction,
                    self.config.counter.adaptive_high_fraction,
                )
            });
        debug!(
            "Counting with thresholds {:.1}/{:.1} over {:.1}..{:.1} deg",
            thresholds.low, thresholds.high, min, max
        );

        let mut counter = RepetitionCounter::new(
            thresholds,
            Duration::from_millis(self.config.counter.min_rep_interval_ms),
            self.config.counter.max_reps,
        );
        let count = counter.count_series(smoothed);

        // Extremum estimate as a cross-check; disagreement is logged,
        // the state machine remains authoritative
        let estimate = estimate_cycles(&degrees, self.config.counter.cycle_policy);
        if estimate.abs_diff(count) > 1 {
            warn!(
                "Rep count {} disagrees with extremum estimate {}",
                count, estimate
            );
        }

        count
    }
}

fn degrees_of(samples: &[AngleSample]) -> Vec<f64> {
    samples.iter().map(|s| s.degrees).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{JointName, Landmark};
    use crate::result::TempoRating;

    fn orchestrator() -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(RepscopeConfig::default())
    }

    /// Frame with both knees bent to the given angle
    fn knee_frame(index: u64, millis: u64, bend: f64) -> Frame {
        let theta = (180.0 - bend).to_radians();
        let (ax, ay) = (0.5 * theta.sin(), 0.5 + 0.5 * theta.cos());
        Frame::new(
            index,
            Duration::from_millis(millis),
            vec![
                Landmark::new(JointName::LeftHip, 0.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::LeftKnee, 0.0, 0.5, 0.0, 0.9),
                Landmark::new(JointName::LeftAnkle, ax, ay, 0.0, 0.9),
                Landmark::new(JointName::RightHip, 1.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::RightKnee, 1.0, 0.5, 0.0, 0.9),
                Landmark::new(JointName::RightAnkle, 1.0 + ax, ay, 0.0, 0.9),
            ],
        )
    }

    /// Knee oscillation between 90 and 170 degrees, `cycles` full reps
    fn squat_frames(cycles: usize, samples_per_cycle: usize, step_ms: u64) -> Vec<Frame> {
        let n = cycles * samples_per_cycle + 1;
        (0..n)
            .map(|i| {
                let phase = i as f64 * std::f64::consts::TAU / samples_per_cycle as f64;
                let bend = 130.0 + 40.0 * phase.cos();
                knee_frame(i as u64, step_ms * i as u64, bend)
            })
            .collect()
    }

    #[test]
    fn test_full_pipeline_counts_reps() {
        let frames = squat_frames(3, 20, 200);
        let outcome = orchestrator().analyze_frames(&frames, None).unwrap();

        let result = outcome.result().expect("expected a result");
        assert_eq!(result.rep_count, 3);
        assert!(result.form_score > 0.0);
        assert!((result.confidence - 90.0).abs() < 1.0);
        assert_eq!(result.analyzed_frame_count, 61);
        assert!((result.duration_seconds - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_hint_pins_exercise_type() {
        let frames = squat_frames(2, 20, 200);
        let outcome = orchestrator()
            .analyze_frames(&frames, Some(ExerciseType::Squat))
            .unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.exercise_type, ExerciseType::Squat);
        assert_eq!(result.rep_count, 2);
    }

    #[test]
    fn test_empty_session_fails() {
        let outcome = orchestrator().analyze_frames(&[], None).unwrap();
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_short_session_degrades() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| knee_frame(i, i * 100, 170.0 - 10.0 * i as f64))
            .collect();
        let outcome = orchestrator().analyze_frames(&frames, None).unwrap();

        match outcome {
            AnalysisOutcome::Degraded { result, .. } => {
                assert_eq!(result.rep_count, 0);
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_mode_fails_on_short_session() {
        let mut config = RepscopeConfig::default();
        config.session.strict = true;
        let frames: Vec<Frame> = (0..3)
            .map(|i| knee_frame(i, i * 100, 170.0 - 10.0 * i as f64))
            .collect();
        let outcome = AnalysisOrchestrator::new(config)
            .analyze_frames(&frames, None)
            .unwrap();
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_out_of_order_frame_degrades() {
        // One duplicated timestamp mid-session: the frame is dropped,
        // the rest of the session still analyzes
        let mut frames = squat_frames(2, 20, 200);
        frames[10].timestamp = frames[9].timestamp;

        let outcome = orchestrator().analyze_frames(&frames, None).unwrap();
        match outcome {
            AnalysisOutcome::Degraded { result, reason } => {
                assert_eq!(result.rep_count, 2);
                assert_eq!(result.total_frame_count, 41);
                assert_eq!(result.analyzed_frame_count, 40);
                assert!(reason.contains("discarded"), "reason: {}", reason);
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_mode_rejects_out_of_order_frames() {
        let mut config = RepscopeConfig::default();
        config.session.strict = true;
        let mut frames = squat_frames(2, 20, 200);
        frames[10].timestamp = frames[9].timestamp;

        let err = AnalysisOrchestrator::new(config)
            .analyze_frames(&frames, None)
            .unwrap_err();
        assert!(matches!(err, RepscopeError::NonMonotonicFrame { index: 10 }));
    }

    /// Torso-only frame: shoulder/hip/knee landmarks, so the hip angle
    /// is observable but the knee angle (which needs an ankle) is not
    fn torso_frame(index: u64, millis: u64, hip_bend: f64) -> Frame {
        let theta = (180.0 - hip_bend).to_radians();
        Frame::new(
            index,
            Duration::from_millis(millis),
            vec![
                Landmark::new(JointName::LeftShoulder, 0.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::LeftHip, 0.0, 0.5, 0.0, 0.9),
                Landmark::new(
                    JointName::LeftKnee,
                    0.5 * theta.sin(),
                    0.5 + 0.5 * theta.cos(),
                    0.0,
                    0.9,
                ),
            ],
        )
    }

    #[test]
    fn test_secondary_joint_fallback() {
        // Squat hint with no ankle data: counting falls back to the
        // signature's secondary joint (hip) and the outcome degrades
        let frames: Vec<Frame> = (0..41)
            .map(|i| {
                let phase = i as f64 * std::f64::consts::TAU / 20.0;
                torso_frame(i as u64, 200 * i as u64, 130.0 + 40.0 * phase.cos())
            })
            .collect();

        let outcome = orchestrator()
            .analyze_frames(&frames, Some(ExerciseType::Squat))
            .unwrap();
        match outcome {
            AnalysisOutcome::Degraded { result, reason } => {
                assert_eq!(result.exercise_type, ExerciseType::Squat);
                assert_eq!(result.rep_count, 2);
                assert!(reason.contains("hip"), "reason: {}", reason);
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_static_pose_counts_nothing() {
        let frames: Vec<Frame> = (0..30)
            .map(|i| knee_frame(i, i * 100, 170.0))
            .collect();
        let outcome = orchestrator()
            .analyze_frames(&frames, Some(ExerciseType::Squat))
            .unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.rep_count, 0);
        assert_eq!(result.tempo, TempoRating::Slow);
    }

    #[tokio::test]
    async fn test_stream_analysis_matches_batch() {
        let frames = squat_frames(2, 20, 200);
        let o = orchestrator();

        let (tx, rx) = mpsc::channel(16);
        let producer = {
            let frames = frames.clone();
            tokio::spawn(async move {
                for frame in frames {
                    tx.send(frame).await.ok();
                }
            })
        };

        let streamed = o.run_stream(rx, None).await.unwrap();
        producer.await.unwrap();
        let batch = o.analyze_frames(&frames, None).unwrap();

        let s = streamed.result().unwrap();
        let b = batch.result().unwrap();
        assert_eq!(s.rep_count, b.rep_count);
        assert_eq!(s.exercise_type, b.exercise_type);
        assert_eq!(s.form_score, b.form_score);
    }

    #[tokio::test]
    async fn test_frame_source_drained() {
        struct VecSource(std::vec::IntoIter<Frame>);

        #[async_trait]
        impl FrameSource for VecSource {
            async fn next_frame(&mut self) -> Result<Option<Frame>> {
                Ok(self.0.next())
            }
        }

        let frames = squat_frames(2, 20, 200);
        let mut source = VecSource(frames.into_iter());
        let outcome = orchestrator()
            .analyze_source(&mut source, None)
            .await
            .unwrap();
        assert_eq!(outcome.result().unwrap().rep_count, 2);
    }
}
