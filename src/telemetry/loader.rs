use std::path::Path;

use log::info;

use super::{Session, TelemetryRecord};
use crate::ApexError;

/// Load a JSON Lines telemetry file, one `TelemetryRecord` per line, and
/// group it into laps.
pub fn load_telemetry_jsonl(source_file: &Path) -> Result<Session, ApexError> {
    if !source_file.is_file() {
        return Err(ApexError::InvalidTelemetryFile {
            path: format!("{:?}", source_file),
        });
    }

    let records = serde_jsonlines::json_lines(source_file)
        .map_err(|e| ApexError::TelemetryLoaderError { source: e })?
        .collect::<Result<Vec<TelemetryRecord>, std::io::Error>>()
        .map_err(|e| ApexError::TelemetryLoaderError { source: e })?;

    if records.is_empty() {
        return Err(ApexError::EmptyTelemetry {
            path: format!("{:?}", source_file),
        });
    }

    let record_count = records.len();
    let session = Session::from_records(records);
    info!(
        "Loaded {:?}, found {} laps with a total of {} samples",
        source_file,
        session.laps.len(),
        record_count
    );
    Ok(session)
}
