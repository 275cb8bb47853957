use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smoothing strategy for angle time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmootherKind {
    /// Plain centered moving average
    MovingAverage,
    /// Median-centered outlier rejection followed by a window average
    MedianFiltered,
}

impl Default for SmootherKind {
    fn default() -> Self {
        SmootherKind::MedianFiltered
    }
}

/// Reduces per-frame noise in an ordered angle sequence.
///
/// The window adapts to the sequence length: it never exceeds the
/// sequence and is forced odd so the filter stays centered. A larger
/// window rejects more jitter but merges true extrema that sit closer
/// together than the window radius, which under-counts fast
/// repetitions; the default of 5 samples keeps extrema separated at
/// typical analysis rates.
#[derive(Debug, Clone, Copy)]
pub struct SignalSmoother {
    kind: SmootherKind,
    window: usize,
    outlier_sigma: f64,
}

impl SignalSmoother {
    pub fn new(kind: SmootherKind, window: usize, outlier_sigma: f64) -> Self {
        Self {
            kind,
            window: window.max(1),
            outlier_sigma,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Smooth a sequence, producing a same-length output.
    ///
    /// Sequences shorter than the minimum window are returned unchanged;
    /// this never fails on short input.
    pub fn smooth(&self, values: &[f64]) -> Vec<f64> {
        if values.len() < 3 || values.len() < self.window {
            debug!(
                "Sequence of {} samples below smoothing window {}, returning unchanged",
                values.len(),
                self.window
            );
            return values.to_vec();
        }

        let window = effective_window(self.window, values.len());
        match self.kind {
            SmootherKind::MovingAverage => moving_average(values, window),
            SmootherKind::MedianFiltered => {
                median_filtered_average(values, window, self.outlier_sigma)
            }
        }
    }
}

/// Clamp the window to the sequence length and force it odd
fn effective_window(window: usize, len: usize) -> usize {
    let mut w = window.min(len);
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    w.max(1)
}

fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let radius = window / 2;
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(values.len());
        let slice = &values[start..end];
        out.push(slice.iter().sum::<f64>() / slice.len() as f64);
    }

    out
}

/// Median-center each window, drop samples beyond `sigma` standard
/// deviations from the median, then average the survivors.
fn median_filtered_average(values: &[f64], window: usize, sigma: f64) -> Vec<f64> {
    let radius = window / 2;
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(values.len());
        let slice = &values[start..end];

        let med = median(slice);
        let sd = std_dev(slice);

        let survivors: Vec<f64> = if sd > 0.0 {
            slice
                .iter()
                .copied()
                .filter(|v| (v - med).abs() <= sigma * sd)
                .collect()
        } else {
            slice.to_vec()
        };

        if survivors.is_empty() {
            out.push(values[i]);
        } else {
            out.push(survivors.iter().sum::<f64>() / survivors.len() as f64);
        }
    }

    out
}

pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoother(kind: SmootherKind) -> SignalSmoother {
        SignalSmoother::new(kind, 5, 2.0)
    }

    #[test]
    fn test_constant_sequence_unchanged() {
        let values = vec![90.0; 20];
        for kind in [SmootherKind::MovingAverage, SmootherKind::MedianFiltered] {
            let out = smoother(kind).smooth(&values);
            assert_eq!(out.len(), values.len());
            for v in out {
                assert!((v - 90.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_short_input_returned_unchanged() {
        let values = vec![170.0, 90.0];
        let out = smoother(SmootherKind::MovingAverage).smooth(&values);
        assert_eq!(out, values);

        let empty: Vec<f64> = vec![];
        assert!(smoother(SmootherKind::MedianFiltered).smooth(&empty).is_empty());
    }

    #[test]
    fn test_same_length_output() {
        let values: Vec<f64> = (0..50).map(|i| 120.0 + (i as f64 * 0.7).sin() * 40.0).collect();
        let out = smoother(SmootherKind::MedianFiltered).smooth(&values);
        assert_eq!(out.len(), values.len());
    }

    #[test]
    fn test_spike_attenuated() {
        let mut values = vec![100.0; 15];
        values[7] = 179.0;
        let out = smoother(SmootherKind::MedianFiltered).smooth(&values);
        // The single-sample spike should be pulled well towards the baseline
        assert!(out[7] < 140.0, "spike survived smoothing: {}", out[7]);
    }

    #[test]
    fn test_moving_average_reduces_noise() {
        let noisy: Vec<f64> = (0..40)
            .map(|i| 120.0 + if i % 2 == 0 { 6.0 } else { -6.0 })
            .collect();
        let out = smoother(SmootherKind::MovingAverage).smooth(&noisy);
        let raw_dev = std_dev(&noisy);
        let smooth_dev = std_dev(&out);
        assert!(smooth_dev < raw_dev);
    }

    #[test]
    fn test_window_adapts_to_length() {
        assert_eq!(effective_window(5, 3), 3);
        assert_eq!(effective_window(5, 4), 3);
        assert_eq!(effective_window(4, 100), 3);
        assert_eq!(effective_window(1, 100), 1);
    }

    #[test]
    fn test_median_and_std() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-9);
        assert!((median(&[4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < 1e-9);
        assert_eq!(std_dev(&[5.0]), 0.0);
    }
}
