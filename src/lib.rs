// Library interface for apexline
// The binary and the integration tests go through these modules

pub mod coaching;
pub mod config;
pub mod corners;
pub mod errors;
pub mod geometry;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod telemetry;

// Re-export commonly used types
pub use config::AnalysisConfig;
pub use corners::{Corner, Direction, Reconciler, Reconciliation};
pub use errors::ApexError;
pub use pipeline::{Analysis, analyze, analyze_file};
pub use report::{AnalysisOutcome, AnalysisReport, NoCornersReason};
pub use telemetry::{Session, TelemetryRecord};
