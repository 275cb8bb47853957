use crate::angle::AngleSample;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::smoothing::mean;

/// Minimum samples required before a rep count is statistically meaningful
pub const MIN_COUNT_SAMPLES: usize = 5;

/// State machine stages for repetition tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepStage {
    Unknown,
    Up,
    Down,
}

/// Angle thresholds driving the {Up, Down} transitions, `low < high`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Thresholds {
    pub fn new(low: f64, high: f64) -> Self {
        debug_assert!(low < high, "low threshold must be below high");
        Self { low, high }
    }

    /// Derive thresholds from the session's own observed range:
    /// low at 40% and high at 60% of the min-to-max span. Used when no
    /// exercise signature is confidently known.
    pub fn adaptive(min_angle: f64, max_angle: f64, low_fraction: f64, high_fraction: f64) -> Self {
        let range = max_angle - min_angle;
        Self {
            low: min_angle + range * low_fraction,
            high: min_angle + range * high_fraction,
        }
    }
}

/// How to reconcile peak and valley counts when they differ by one
/// (session starting or ending mid-repetition). Both policies appear in
/// field data; treat as a tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Count only complete cycles: min(peaks, valleys)
    Complete,
    /// Credit the partial end cycle: max(peaks, valleys) when the
    /// counts differ by exactly one
    Generous,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::Generous
    }
}

/// Transient per-session counter state. Owned by one counter for one
/// session and discarded at session end.
#[derive(Debug, Clone)]
pub struct RepState {
    pub stage: RepStage,
    pub count: u32,
    pub last_count_time: Option<Duration>,
}

impl RepState {
    fn new() -> Self {
        Self {
            stage: RepStage::Unknown,
            count: 0,
            last_count_time: None,
        }
    }
}

/// Counts repetition cycles in a smoothed angle sequence.
///
/// Transitions: angle above `high` enters Up; angle below `low` while in
/// Up enters Down and counts a repetition, gated by a refractory period
/// measured in session elapsed time so the count is independent of the
/// sampling rate. Dropping below `low` with no prior Up stage is a no-op,
/// which guards against counting a partial cycle when the session starts
/// at the bottom of the movement.
#[derive(Debug, Clone)]
pub struct RepetitionCounter {
    thresholds: Thresholds,
    refractory: Duration,
    max_reps: u32,
    state: RepState,
}

impl RepetitionCounter {
    pub fn new(thresholds: Thresholds, refractory: Duration, max_reps: u32) -> Self {
        Self {
            thresholds,
            refractory,
            max_reps,
            state: RepState::new(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn stage(&self) -> RepStage {
        self.state.stage
    }

    pub fn count(&self) -> u32 {
        self.state.count
    }

    /// Seed the initial stage from the first sample's position relative
    /// to the thresholds. Sessions that begin mid-repetition would
    /// otherwise under-count.
    pub fn seed(&mut self, first_angle: f64) {
        if first_angle > self.thresholds.high {
            self.state.stage = RepStage::Up;
            debug!("Session starts in up position ({:.1} deg)", first_angle);
        } else if first_angle < self.thresholds.low {
            self.state.stage = RepStage::Down;
            debug!("Session starts in down position ({:.1} deg)", first_angle);
        }
    }

    /// Feed one smoothed sample; returns true when a repetition was
    /// counted at this sample.
    pub fn observe(&mut self, angle: f64, timestamp: Duration) -> bool {
        if angle > self.thresholds.high {
            if self.state.stage != RepStage::Up {
                debug!(
                    "Up position at {:?} ({:.1} > {:.1} deg)",
                    timestamp, angle, self.thresholds.high
                );
            }
            self.state.stage = RepStage::Up;
            return false;
        }

        if angle < self.thresholds.low {
            if self.state.stage == RepStage::Up {
                let elapsed_ok = match self.state.last_count_time {
                    Some(last) => timestamp.saturating_sub(last) >= self.refractory,
                    None => true,
                };

                if elapsed_ok && self.state.count < self.max_reps {
                    self.state.stage = RepStage::Down;
                    self.state.count += 1;
                    self.state.last_count_time = Some(timestamp);
                    info!(
                        "Rep #{} counted at {:.2}s ({:.1} < {:.1} deg)",
                        self.state.count,
                        timestamp.as_secs_f64(),
                        angle,
                        self.thresholds.low
                    );
                    return true;
                }

                if !elapsed_ok {
                    debug!(
                        "Rep suppressed at {:?}: within refractory period {:?}",
                        timestamp, self.refractory
                    );
                }
            } else {
                self.state.stage = RepStage::Down;
            }
        }

        false
    }

    /// Run the state machine over a full smoothed sequence.
    ///
    /// Sequences shorter than the minimum sample count return zero
    /// rather than a spurious result.
    pub fn count_series(&mut self, samples: &[AngleSample]) -> u32 {
        if samples.len() < MIN_COUNT_SAMPLES {
            debug!(
                "Only {} samples, below minimum {}; rep count is 0",
                samples.len(),
                MIN_COUNT_SAMPLES
            );
            return 0;
        }

        self.seed(samples[0].degrees);
        for sample in samples {
            self.observe(sample.degrees, sample.timestamp);
        }
        self.state.count
    }
}

/// Extremum-based cycle estimate over a smoothed sequence.
///
/// Peaks are local maxima above the sequence mean, valleys local minima
/// below it. Used as a cross-check against the state machine and for
/// sequences where thresholds are unreliable.
pub fn estimate_cycles(values: &[f64], policy: CyclePolicy) -> u32 {
    if values.len() < MIN_COUNT_SAMPLES {
        return 0;
    }

    let avg = mean(values);
    let mut peaks = 0u32;
    let mut valleys = 0u32;

    for i in 1..values.len() - 1 {
        if values[i] > values[i - 1] && values[i] > values[i + 1] && values[i] > avg {
            peaks += 1;
        } else if values[i] < values[i - 1] && values[i] < values[i + 1] && values[i] < avg {
            valleys += 1;
        }
    }

    debug!("Extremum scan: {} peaks, {} valleys", peaks, valleys);

    match policy {
        CyclePolicy::Complete => peaks.min(valleys),
        CyclePolicy::Generous => {
            if peaks.abs_diff(valleys) == 1 {
                peaks.max(valleys)
            } else {
                peaks.min(valleys)
            }
        }
    }
}
