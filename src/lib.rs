pub mod angle;
pub mod classifier;
pub mod config;
pub mod counter;
pub mod error;
pub mod landmark;
pub mod orchestrator;
pub mod result;
pub mod scorer;
pub mod session;
pub mod signature;
pub mod smoothing;

pub use angle::{
    AngleCalculator, AngleDimension, AngleExtractor, AngleKind, AngleSample, FrameAngles,
};
pub use classifier::{Classification, ExerciseClassifier, RomStats, RomSummary};
pub use config::{
    AngleConfig, ClassifierConfig, CounterConfig, RepscopeConfig, ScorerConfig, SessionConfig,
    SmoothingConfig,
};
pub use counter::{CyclePolicy, RepStage, RepetitionCounter, Thresholds};
pub use error::{RepscopeError, Result};
pub use landmark::{Frame, JointName, Landmark, Side};
pub use orchestrator::{AnalysisOrchestrator, FrameSource};
pub use result::{AnalysisOutcome, AnalysisResult, TempoRating, VelocityStats};
pub use scorer::{Compensation, CompensationKind, Deduction, FormScore, FormScorer, Severity};
pub use session::{JointSeries, Session};
pub use signature::{
    builtin_signatures, signature_for, ExerciseSignature, ExerciseType, ExpectedRom, RomInterval,
};
pub use smoothing::{SignalSmoother, SmootherKind};
