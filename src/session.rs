use crate::angle::{AngleExtractor, AngleKind, AngleSample};
use crate::classifier::{RomStats, RomSummary};
use crate::error::{RepscopeError, Result};
use crate::landmark::Frame;

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Left/right/combined angle samples for one joint across a session
#[derive(Debug, Clone, Default)]
pub struct JointSeries {
    pub left: Vec<AngleSample>,
    pub right: Vec<AngleSample>,
    /// Bilateral average, the series used for counting and scoring
    pub combined: Vec<AngleSample>,
}

/// Per-session analysis context.
///
/// Owns all mutable state for one session: angle buffers, frame
/// counters, and bilateral statistics. Nothing is shared between
/// sessions, so independent sessions can run on separate threads
/// without coordination.
#[derive(Debug)]
pub struct Session {
    extractor: AngleExtractor,
    visibility_floor: f64,
    series: HashMap<AngleKind, JointSeries>,
    asymmetry_sums: HashMap<AngleKind, (f64, u64)>,
    total_frames: u64,
    analyzed_frames: u64,
    dropped_frames: u64,
    visibility_sum: f64,
    first_timestamp: Option<Duration>,
    last_timestamp: Option<Duration>,
}

impl Session {
    pub fn new(extractor: AngleExtractor, visibility_floor: f64) -> Self {
        Self {
            extractor,
            visibility_floor,
            series: HashMap::new(),
            asymmetry_sums: HashMap::new(),
            total_frames: 0,
            analyzed_frames: 0,
            dropped_frames: 0,
            visibility_sum: 0.0,
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    /// Append one frame in temporal order.
    ///
    /// Returns `Ok(true)` when the frame was analyzed, `Ok(false)` when
    /// it was dropped for insufficient landmark visibility. Frames must
    /// arrive with strictly increasing timestamps; reordered frames
    /// corrupt the rep counter's refractory timing and are rejected.
    /// Landmarks with non-finite coordinates are rejected as invalid
    /// geometry.
    pub fn push_frame(&mut self, frame: &Frame) -> Result<bool> {
        self.total_frames += 1;

        if let Some(last) = self.last_timestamp {
            if frame.timestamp <= last {
                return Err(RepscopeError::NonMonotonicFrame { index: frame.index });
            }
        }

        // Field presence is typed away; coordinate sanity is not
        for lm in &frame.landmarks {
            if !(lm.x.is_finite() && lm.y.is_finite() && lm.z.is_finite() && lm.visibility.is_finite())
            {
                return Err(RepscopeError::InvalidGeometry {
                    details: format!(
                        "non-finite coordinates for {:?} in frame {}",
                        lm.name, frame.index
                    ),
                });
            }
        }

        self.first_timestamp.get_or_insert(frame.timestamp);
        self.last_timestamp = Some(frame.timestamp);

        if !frame.is_reliable(self.visibility_floor) {
            debug!(
                "Frame {} below visibility floor {:.2}, dropped",
                frame.index, self.visibility_floor
            );
            self.dropped_frames += 1;
            return Ok(false);
        }

        for kind in AngleKind::ALL {
            let angles = self.extractor.extract(frame, kind);
            let entry = self.series.entry(kind).or_default();

            if let (Some(left), Some(right)) = (angles.left, angles.right) {
                let (sum, count) = self.asymmetry_sums.entry(kind).or_insert((0.0, 0));
                *sum += (left.degrees - right.degrees).abs();
                *count += 1;
            }

            if let Some(left) = angles.left {
                entry.left.push(left);
            }
            if let Some(right) = angles.right {
                entry.right.push(right);
            }
            if let Some(combined) = angles.combined {
                entry.combined.push(combined);
            }
        }

        self.visibility_sum += frame.mean_visibility();
        self.analyzed_frames += 1;
        Ok(true)
    }

    /// Combined series for one joint, empty slice when never observed
    pub fn series(&self, kind: AngleKind) -> &[AngleSample] {
        self.series
            .get(&kind)
            .map(|s| s.combined.as_slice())
            .unwrap_or(&[])
    }

    /// Per-joint min/max summary over the combined series
    pub fn rom_summary(&self) -> RomSummary {
        let mut summary = RomSummary::default();

        for kind in AngleKind::ALL {
            let samples = self.series(kind);
            if samples.is_empty() {
                continue;
            }
            let min = samples
                .iter()
                .map(|s| s.degrees)
                .fold(f64::INFINITY, f64::min);
            let max = samples
                .iter()
                .map(|s| s.degrees)
                .fold(f64::NEG_INFINITY, f64::max);
            summary.set(kind, RomStats { min, max });
        }

        summary
    }

    /// Mean bilateral angle difference per joint, for joints where both
    /// sides were observed together
    pub fn asymmetry(&self) -> Vec<(AngleKind, f64)> {
        let mut gaps: Vec<(AngleKind, f64)> = self
            .asymmetry_sums
            .iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(kind, (sum, count))| (*kind, sum / *count as f64))
            .collect();
        // Deterministic output order
        gaps.sort_by_key(|(kind, _)| kind.label());
        gaps
    }

    /// Elapsed session time between the first and last accepted frame
    pub fn duration(&self) -> Duration {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => Duration::ZERO,
        }
    }

    /// Mean landmark visibility across analyzed frames, in [0, 1]
    pub fn mean_visibility(&self) -> f64 {
        if self.analyzed_frames == 0 {
            return 0.0;
        }
        self.visibility_sum / self.analyzed_frames as f64
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn analyzed_frames(&self) -> u64 {
        self.analyzed_frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Log a one-line intake summary, useful at session end
    pub fn log_intake(&self) {
        if self.dropped_frames > 0 {
            warn!(
                "Session intake: {}/{} frames analyzed, {} dropped below visibility floor",
                self.analyzed_frames, self.total_frames, self.dropped_frames
            );
        } else {
            debug!(
                "Session intake: {}/{} frames analyzed",
                self.analyzed_frames, self.total_frames
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::{AngleCalculator, AngleDimension, DEGENERATE_EPSILON};
    use crate::landmark::{JointName, Landmark};

    fn session() -> Session {
        let calc = AngleCalculator::new(AngleDimension::TwoD, DEGENERATE_EPSILON);
        Session::new(AngleExtractor::new(calc), 0.5)
    }

    /// Legs-only frame with both knees at a controllable bend
    fn leg_frame(index: u64, millis: u64, left_bend: f64, right_bend: f64) -> Frame {
        let bend_point = |bend: f64, x0: f64| {
            // Place the ankle so the knee angle equals `bend` degrees
            let theta = (180.0 - bend).to_radians();
            (x0 + 0.5 * theta.sin(), 0.5 + 0.5 * theta.cos())
        };
        let (lax, lay) = bend_point(left_bend, 0.0);
        let (rax, ray) = bend_point(right_bend, 1.0);
        Frame::new(
            index,
            Duration::from_millis(millis),
            vec![
                Landmark::new(JointName::LeftHip, 0.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::LeftKnee, 0.0, 0.5, 0.0, 0.9),
                Landmark::new(JointName::LeftAnkle, lax, lay, 0.0, 0.9),
                Landmark::new(JointName::RightHip, 1.0, 0.0, 0.0, 0.9),
                Landmark::new(JointName::RightKnee, 1.0, 0.5, 0.0, 0.9),
                Landmark::new(JointName::RightAnkle, rax, ray, 0.0, 0.9),
            ],
        )
    }

    #[test]
    fn test_push_and_series() {
        let mut s = session();
        assert!(s.push_frame(&leg_frame(0, 0, 170.0, 170.0)).unwrap());
        assert!(s.push_frame(&leg_frame(1, 100, 90.0, 90.0)).unwrap());

        let knee = s.series(AngleKind::Knee);
        assert_eq!(knee.len(), 2);
        assert!((knee[0].degrees - 170.0).abs() < 1.0);
        assert!((knee[1].degrees - 90.0).abs() < 1.0);
        assert_eq!(s.analyzed_frames(), 2);
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let mut s = session();
        s.push_frame(&leg_frame(0, 100, 170.0, 170.0)).unwrap();
        let err = s.push_frame(&leg_frame(1, 50, 90.0, 90.0)).unwrap_err();
        assert!(matches!(err, RepscopeError::NonMonotonicFrame { index: 1 }));

        // Equal timestamps are also rejected
        let err = s.push_frame(&leg_frame(2, 100, 90.0, 90.0)).unwrap_err();
        assert!(matches!(err, RepscopeError::NonMonotonicFrame { index: 2 }));
    }

    #[test]
    fn test_non_finite_landmark_rejected() {
        let mut s = session();
        let mut frame = leg_frame(0, 0, 170.0, 170.0);
        frame.landmarks[2].y = f64::NAN;
        let err = s.push_frame(&frame).unwrap_err();
        assert!(matches!(err, RepscopeError::InvalidGeometry { .. }));
        assert!(s.series(AngleKind::Knee).is_empty());
    }

    #[test]
    fn test_low_visibility_dropped() {
        let mut s = session();
        let mut frame = leg_frame(0, 0, 170.0, 170.0);
        for lm in &mut frame.landmarks {
            lm.visibility = 0.2;
        }
        assert!(!s.push_frame(&frame).unwrap());
        assert_eq!(s.dropped_frames(), 1);
        assert_eq!(s.analyzed_frames(), 0);
        assert!(s.series(AngleKind::Knee).is_empty());
    }

    #[test]
    fn test_rom_summary() {
        let mut s = session();
        s.push_frame(&leg_frame(0, 0, 170.0, 170.0)).unwrap();
        s.push_frame(&leg_frame(1, 100, 90.0, 90.0)).unwrap();
        s.push_frame(&leg_frame(2, 200, 170.0, 170.0)).unwrap();

        let summary = s.rom_summary();
        let knee = summary.knee.unwrap();
        assert!((knee.rom() - 80.0).abs() < 2.0);
        assert!(summary.elbow.is_none());
    }

    #[test]
    fn test_asymmetry_tracking() {
        let mut s = session();
        s.push_frame(&leg_frame(0, 0, 170.0, 150.0)).unwrap();
        s.push_frame(&leg_frame(1, 100, 170.0, 150.0)).unwrap();

        let gaps = s.asymmetry();
        let knee_gap = gaps
            .iter()
            .find(|(kind, _)| *kind == AngleKind::Knee)
            .map(|(_, gap)| *gap)
            .unwrap();
        assert!((knee_gap - 20.0).abs() < 2.0);
    }

    #[test]
    fn test_duration_and_visibility() {
        let mut s = session();
        assert_eq!(s.duration(), Duration::ZERO);
        s.push_frame(&leg_frame(0, 0, 170.0, 170.0)).unwrap();
        s.push_frame(&leg_frame(1, 1500, 90.0, 90.0)).unwrap();
        assert_eq!(s.duration(), Duration::from_millis(1500));
        assert!((s.mean_visibility() - 0.9).abs() < 1e-9);
    }
}
