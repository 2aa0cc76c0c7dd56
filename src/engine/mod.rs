//! Gap detection and certification engine.
//!
//! Pipeline order is fixed: detect, profile, score, overlay, aggregate,
//! evaluate. `analyzer` glues the stages together; every stage is also
//! usable on its own.

pub mod analyzer;
pub mod detector;
pub mod extract;
pub mod overlay;
pub mod profile;
pub mod scorer;
pub mod thresholds;

pub use analyzer::{AnalyzerSources, GapAnalyzer, VehicleAnalysis};
pub use detector::{AnalysisWindow, GapDetector};
pub use scorer::{ConfidenceScorer, GapAnalysis, GapFactors};
pub use thresholds::{AlertDraft, ThresholdEvaluator, VehicleGapMetrics};
