// Error types for apexline

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum ApexError {
    // Errors while loading telemetry
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
    #[snafu(display("Error loading telemetry file"))]
    TelemetryLoaderError { source: io::Error },
    #[snafu(display("Telemetry file contains no samples: {path}"))]
    EmptyTelemetry { path: String },

    // Config management errors
    #[snafu(display("Could not find application config directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Invalid configuration: {field} - {reason}"))]
    InvalidConfig { field: String, reason: String },

    // Errors for the report writer
    #[snafu(display("Error writing report file"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing report"))]
    ReportSerializeError { source: serde_json::Error },

    // Reconciler invariant violations. These abort the analysis: continuing
    // would hand out a partially numbered corner list.
    #[snafu(display("Internal error: corner group {group} has no per-lap data"))]
    EmptyCornerGroup { group: usize },
    #[snafu(display(
        "Internal error: candidate {provisional_id} on lap {lap_number} was neither renumbered nor discarded"
    ))]
    MissingRenumbering { lap_number: u32, provisional_id: u32 },
    #[snafu(display("Internal error: canonical corner list is inconsistent: {reason}"))]
    CornerInvariantViolation { reason: String },
}

impl ApexError {
    /// Whether the error comes from a broken invariant inside the analysis
    /// core rather than from bad input or I/O.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ApexError::EmptyCornerGroup { .. }
                | ApexError::MissingRenumbering { .. }
                | ApexError::CornerInvariantViolation { .. }
        )
    }
}
