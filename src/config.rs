use crate::angle::AngleDimension;
use crate::counter::CyclePolicy;
use crate::smoothing::SmootherKind;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepscopeConfig {
    pub angle: AngleConfig,
    pub smoothing: SmoothingConfig,
    pub counter: CounterConfig,
    pub classifier: ClassifierConfig,
    pub scorer: ScorerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AngleConfig {
    /// Angle computation mode (two_d or three_d)
    #[serde(default)]
    pub dimension: AngleDimension,

    /// Vector magnitude below which a landmark triple is degenerate
    #[serde(default = "default_angle_epsilon")]
    pub epsilon: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmoothingConfig {
    /// Smoothing strategy (moving_average or median_filtered)
    #[serde(default)]
    pub kind: SmootherKind,

    /// Smoothing window in samples
    #[serde(default = "default_smoothing_window")]
    pub window: usize,

    /// Standard deviations from the window median beyond which a sample
    /// is rejected as an outlier
    #[serde(default = "default_outlier_sigma")]
    pub outlier_sigma: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CounterConfig {
    /// Refractory period between counted reps, in milliseconds of
    /// session time
    #[serde(default = "default_min_rep_interval_ms")]
    pub min_rep_interval_ms: u64,

    /// Minimum samples before a rep count is attempted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Adaptive low threshold as a fraction of the observed angle range
    #[serde(default = "default_adaptive_low_fraction")]
    pub adaptive_low_fraction: f64,

    /// Adaptive high threshold as a fraction of the observed angle range
    #[serde(default = "default_adaptive_high_fraction")]
    pub adaptive_high_fraction: f64,

    /// Sanity cap on reps per session
    #[serde(default = "default_max_reps")]
    pub max_reps: u32,

    /// How to reconcile peak and valley counts that differ by one
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Degrees from an expected interval's midpoint that still earn
    /// partial credit
    #[serde(default = "default_tolerance_band")]
    pub tolerance_band: f64,

    /// Fraction of available points the best signature must reach,
    /// otherwise the session is reported as general movement
    #[serde(default = "default_min_score_fraction")]
    pub min_score_fraction: f64,

    /// Hip-to-knee ROM ratio above which a lower-body tie resolves to
    /// the hip-dominant movement
    #[serde(default = "default_hip_knee_ratio")]
    pub hip_knee_ratio: f64,

    /// Minimum dominant-joint ROM in degrees for any classification
    #[serde(default = "default_min_rom")]
    pub min_rom: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScorerConfig {
    /// Lowest score reported for a session with countable reps
    #[serde(default = "default_score_floor")]
    pub floor: f64,

    /// Deduction per degree short of the ideal bottom window
    #[serde(default = "default_depth_per_degree")]
    pub depth_per_degree: f64,

    /// Deduction per degree short of the ideal top window
    #[serde(default = "default_lockout_per_degree")]
    pub lockout_per_degree: f64,

    /// Deduction when bottom-position depth varies beyond the
    /// signature's tolerance
    #[serde(default = "default_consistency_penalty")]
    pub consistency_penalty: f64,

    /// Bilateral difference bounds for mild/moderate/severe compensations
    #[serde(default = "default_mild_threshold")]
    pub mild_threshold: f64,
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,
    #[serde(default = "default_severe_threshold")]
    pub severe_threshold: f64,

    /// Deductions per compensation severity tier
    #[serde(default = "default_mild_penalty")]
    pub mild_penalty: f64,
    #[serde(default = "default_moderate_penalty")]
    pub moderate_penalty: f64,
    #[serde(default = "default_severe_penalty")]
    pub severe_penalty: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Mean landmark visibility below which a frame is dropped
    #[serde(default = "default_visibility_floor")]
    pub visibility_floor: f64,

    /// Fail the analysis instead of degrading when data is insufficient
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl RepscopeConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("repscope.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("angle.dimension", "two_d")?
            .set_default("angle.epsilon", default_angle_epsilon())?
            .set_default("smoothing.kind", "median_filtered")?
            .set_default("smoothing.window", default_smoothing_window() as i64)?
            .set_default("smoothing.outlier_sigma", default_outlier_sigma())?
            .set_default(
                "counter.min_rep_interval_ms",
                default_min_rep_interval_ms() as i64,
            )?
            .set_default("counter.min_samples", default_min_samples() as i64)?
            .set_default(
                "counter.adaptive_low_fraction",
                default_adaptive_low_fraction(),
            )?
            .set_default(
                "counter.adaptive_high_fraction",
                default_adaptive_high_fraction(),
            )?
            .set_default("counter.max_reps", default_max_reps() as i64)?
            .set_default("counter.cycle_policy", "generous")?
            .set_default("classifier.tolerance_band", default_tolerance_band())?
            .set_default(
                "classifier.min_score_fraction",
                default_min_score_fraction(),
            )?
            .set_default("classifier.hip_knee_ratio", default_hip_knee_ratio())?
            .set_default("classifier.min_rom", default_min_rom())?
            .set_default("scorer.floor", default_score_floor())?
            .set_default("scorer.depth_per_degree", default_depth_per_degree())?
            .set_default("scorer.lockout_per_degree", default_lockout_per_degree())?
            .set_default("scorer.consistency_penalty", default_consistency_penalty())?
            .set_default("scorer.mild_threshold", default_mild_threshold())?
            .set_default("scorer.moderate_threshold", default_moderate_threshold())?
            .set_default("scorer.severe_threshold", default_severe_threshold())?
            .set_default("scorer.mild_penalty", default_mild_penalty())?
            .set_default("scorer.moderate_penalty", default_moderate_penalty())?
            .set_default("scorer.severe_penalty", default_severe_penalty())?
            .set_default("session.visibility_floor", default_visibility_floor())?
            .set_default("session.strict", default_strict())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with REPSCOPE_ prefix
            .add_source(Environment::with_prefix("REPSCOPE").separator("_"))
            .build()?;

        let config: RepscopeConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.angle.epsilon <= 0.0 {
            return Err(ConfigError::Message(
                "Angle epsilon must be greater than 0".to_string(),
            ));
        }

        if self.smoothing.window == 0 {
            return Err(ConfigError::Message(
                "Smoothing window must be greater than 0".to_string(),
            ));
        }

        if self.smoothing.outlier_sigma <= 0.0 {
            return Err(ConfigError::Message(
                "Smoothing outlier_sigma must be greater than 0".to_string(),
            ));
        }

        if self.counter.adaptive_low_fraction >= self.counter.adaptive_high_fraction {
            return Err(ConfigError::Message(
                "Counter adaptive_low_fraction must be below adaptive_high_fraction".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.counter.adaptive_low_fraction)
            || !(0.0..=1.0).contains(&self.counter.adaptive_high_fraction)
        {
            return Err(ConfigError::Message(
                "Counter threshold fractions must be within [0, 1]".to_string(),
            ));
        }

        if self.counter.max_reps == 0 {
            return Err(ConfigError::Message(
                "Counter max_reps must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.classifier.min_score_fraction) {
            return Err(ConfigError::Message(
                "Classifier min_score_fraction must be within [0, 1]".to_string(),
            ));
        }

        if !(self.scorer.mild_threshold < self.scorer.moderate_threshold
            && self.scorer.moderate_threshold < self.scorer.severe_threshold)
        {
            return Err(ConfigError::Message(
                "Scorer severity thresholds must be strictly increasing".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.scorer.floor) {
            return Err(ConfigError::Message(
                "Scorer floor must be within [0, 100]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.session.visibility_floor) {
            return Err(ConfigError::Message(
                "Session visibility_floor must be within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RepscopeConfig {
    fn default() -> Self {
        Self {
            angle: AngleConfig::default(),
            smoothing: SmoothingConfig::default(),
            counter: CounterConfig::default(),
            classifier: ClassifierConfig::default(),
            scorer: ScorerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            dimension: AngleDimension::default(),
            epsilon: default_angle_epsilon(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            kind: SmootherKind::default(),
            window: default_smoothing_window(),
            outlier_sigma: default_outlier_sigma(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            min_rep_interval_ms: default_min_rep_interval_ms(),
            min_samples: default_min_samples(),
            adaptive_low_fraction: default_adaptive_low_fraction(),
            adaptive_high_fraction: default_adaptive_high_fraction(),
            max_reps: default_max_reps(),
            cycle_policy: CyclePolicy::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tolerance_band: default_tolerance_band(),
            min_score_fraction: default_min_score_fraction(),
            hip_knee_ratio: default_hip_knee_ratio(),
            min_rom: default_min_rom(),
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            floor: default_score_floor(),
            depth_per_degree: default_depth_per_degree(),
            lockout_per_degree: default_lockout_per_degree(),
            consistency_penalty: default_consistency_penalty(),
            mild_threshold: default_mild_threshold(),
            moderate_threshold: default_moderate_threshold(),
            severe_threshold: default_severe_threshold(),
            mild_penalty: default_mild_penalty(),
            moderate_penalty: default_moderate_penalty(),
            severe_penalty: default_severe_penalty(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            visibility_floor: default_visibility_floor(),
            strict: default_strict(),
        }
    }
}

// Default value functions
fn default_angle_epsilon() -> f64 {
    1e-6
}

fn default_smoothing_window() -> usize {
    5
}
fn default_outlier_sigma() -> f64 {
    2.0
}

fn default_min_rep_interval_ms() -> u64 {
    500
}
fn default_min_samples() -> usize {
    5
}
fn default_adaptive_low_fraction() -> f64 {
    0.4
}
fn default_adaptive_high_fraction() -> f64 {
    0.6
}
fn default_max_reps() -> u32 {
    20
}

fn default_tolerance_band() -> f64 {
    20.0
}
fn default_min_score_fraction() -> f64 {
    0.5
}
fn default_hip_knee_ratio() -> f64 {
    1.5
}
fn default_min_rom() -> f64 {
    30.0
}

fn default_score_floor() -> f64 {
    60.0
}
fn default_depth_per_degree() -> f64 {
    1.0
}
fn default_lockout_per_degree() -> f64 {
    0.75
}
fn default_consistency_penalty() -> f64 {
    10.0
}
fn default_mild_threshold() -> f64 {
    10.0
}
fn default_moderate_threshold() -> f64 {
    20.0
}
fn default_severe_threshold() -> f64 {
    30.0
}
fn default_mild_penalty() -> f64 {
    5.0
}
fn default_moderate_penalty() -> f64 {
    15.0
}
fn default_severe_penalty() -> f64 {
    25.0
}

fn default_visibility_floor() -> f64 {
    0.5
}
fn default_strict() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RepscopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.smoothing.window, 5);
        assert_eq!(config.counter.max_reps, 20);
        assert!((config.classifier.hip_knee_ratio - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = RepscopeConfig::load_from_file("/nonexistent/repscope.toml").unwrap();
        assert_eq!(config.counter.min_rep_interval_ms, 500);
        assert_eq!(config.smoothing.kind, SmootherKind::MedianFiltered);
        assert_eq!(config.angle.dimension, AngleDimension::TwoD);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[smoothing]\nwindow = 9\n\n[counter]\nmax_reps = 40\ncycle_policy = \"complete\"\n"
        )
        .unwrap();

        let config = RepscopeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.smoothing.window, 9);
        assert_eq!(config.counter.max_reps, 40);
        assert_eq!(config.counter.cycle_policy, CyclePolicy::Complete);
        // Untouched sections keep their defaults
        assert!((config.scorer.floor - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RepscopeConfig::default();
        config.counter.adaptive_low_fraction = 0.7;
        assert!(config.validate().is_err());

        config.counter.adaptive_low_fraction = 0.4;
        assert!(config.validate().is_ok());

        config.scorer.moderate_threshold = 5.0;
        assert!(config.validate().is_err());

        config.scorer.moderate_threshold = 20.0;
        config.session.visibility_floor = 1.5;
        assert!(config.validate().is_err());
    }
}
