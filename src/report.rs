use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::ApexError;
use crate::coaching::CoachingAdvice;
use crate::corners::{Corner, CornerAssignments, LapDetection};
use crate::scoring::SessionScore;
use crate::telemetry::SelectedLaps;

/// Counters describing how the corner list was obtained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub selected_laps: Vec<u32>,
    pub reference_lap: Option<u32>,
    pub sample_count: usize,
    /// Per-lap candidates before reconciliation
    pub candidate_count: usize,
    /// Candidates dropped as duplicates
    pub discarded_count: usize,
    pub corner_count: usize,
    /// Matching window used to group candidates across laps (m)
    pub distance_tolerance_m: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub statistics: AnalysisStatistics,
    pub corners: Vec<Corner>,
    pub score: SessionScore,
    pub advice: Vec<CoachingAdvice>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoCornersReason {
    NoSelectedLaps,
    NoCandidates,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed(AnalysisReport),
    NoCornersDetected { reason: NoCornersReason },
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Completed(report) => Some(report),
            AnalysisOutcome::NoCornersDetected { .. } => None,
        }
    }
}

/// One line of the sample export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    pub global_index: usize,
    pub lap_number: u32,
    pub lap_local_index: usize,
    pub lat: f64,
    pub lon: f64,
    pub speed_kmh: f64,
    pub cumulative_distance_m: f64,
    pub lateral_g: f64,
    pub corner_id: Option<u32>,
}

pub fn write_report(file: &Path, outcome: &AnalysisOutcome) -> Result<(), ApexError> {
    let report_file = File::create(file).map_err(|e| ApexError::WriterError { source: e })?;
    let mut report_writer = BufWriter::new(report_file);
    serde_json::to_writer_pretty(&mut report_writer, outcome)
        .map_err(|e| ApexError::ReportSerializeError { source: e })?;
    writeln!(report_writer).map_err(|e| ApexError::WriterError { source: e })?;
    report_writer
        .flush()
        .map_err(|e| ApexError::WriterError { source: e })?;
    info!("Report written to {:?}", file);
    Ok(())
}

pub fn read_report(file: &Path) -> Result<AnalysisOutcome, ApexError> {
    let report_file = File::open(file).map_err(|e| ApexError::WriterError { source: e })?;
    serde_json::from_reader(std::io::BufReader::new(report_file))
        .map_err(|e| ApexError::ReportSerializeError { source: e })
}

/// Rows for every selected sample. Geometry values are zero on laps without
/// a detection.
pub fn sample_rows(
    laps: &SelectedLaps,
    detections: &[LapDetection],
    assignments: Option<&CornerAssignments>,
) -> Vec<SampleRow> {
    let mut rows = Vec::with_capacity(laps.sample_count());
    for lap in laps.laps() {
        let geometry = detections
            .iter()
            .find(|d| d.lap_number == lap.lap_number)
            .map(|d| &d.geometry);
        for sample in &lap.samples {
            let at = |values: Option<&Vec<f64>>| {
                values
                    .and_then(|v| v.get(sample.lap_local_index))
                    .copied()
                    .unwrap_or(0.0)
            };
            rows.push(SampleRow {
                global_index: sample.global_index,
                lap_number: sample.lap_number,
                lap_local_index: sample.lap_local_index,
                lat: sample.lat,
                lon: sample.lon,
                speed_kmh: sample.speed_kmh,
                cumulative_distance_m: at(geometry.map(|g| &g.cumulative_distance)),
                lateral_g: at(geometry.map(|g| &g.lateral_g)),
                corner_id: assignments
                    .and_then(|a| a.corner_at(sample.lap_number, sample.lap_local_index)),
            });
        }
    }
    rows
}

pub fn write_samples_jsonl(file: &Path, rows: &[SampleRow]) -> Result<(), ApexError> {
    serde_jsonlines::write_json_lines(file, rows)
        .map_err(|e| ApexError::WriterError { source: e })?;
    info!("Wrote {} samples to {:?}", rows.len(), file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Grade, ScoreBreakdown, ScoreDetails};
    use tempfile::TempDir;

    fn empty_report() -> AnalysisReport {
        AnalysisReport {
            statistics: AnalysisStatistics {
                selected_laps: vec![1, 2],
                reference_lap: Some(1),
                sample_count: 200,
                candidate_count: 0,
                discarded_count: 0,
                corner_count: 0,
                distance_tolerance_m: 10.0,
            },
            corners: vec![],
            score: SessionScore {
                overall_score: 50.0,
                grade: Grade::D,
                percentile: 25,
                breakdown: ScoreBreakdown {
                    apex_precision: 10.0,
                    trajectory_consistency: 10.0,
                    apex_speed: 10.0,
                    sector_times: 20.0,
                },
                details: ScoreDetails {
                    best_corners: vec![],
                    worst_corners: vec![],
                    average_apex_error_m: 0.0,
                    average_efficiency: 0.0,
                    consistency_index: 0.5,
                },
            },
            advice: vec![],
        }
    }

    #[test]
    fn test_no_corners_outcome_serialization() {
        let outcome = AnalysisOutcome::NoCornersDetected {
            reason: NoCornersReason::NoCandidates,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_corners_detected");
        assert_eq!(json["result"]["reason"], "no_candidates");
        assert!(outcome.report().is_none());
    }

    #[test]
    fn test_report_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        let outcome = AnalysisOutcome::Completed(empty_report());

        write_report(&path, &outcome).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["score"]["grade"], "D");

        let loaded = read_report(&path).unwrap();
        assert_eq!(loaded, outcome);
    }

    #[test]
    fn test_write_report_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("report.json");
        let outcome = AnalysisOutcome::NoCornersDetected {
            reason: NoCornersReason::NoSelectedLaps,
        };
        assert!(matches!(
            write_report(&path, &outcome),
            Err(ApexError::WriterError { .. })
        ));
    }

    #[test]
    fn test_sample_rows_without_detection() {
        let mut session = crate::telemetry::Session::from_records(
            crate::telemetry::synthetic::straight_lap_records(1, 0.0, 50.0, 36.0),
        );
        let laps = session.select(&Default::default());
        let rows = sample_rows(&laps, &[], None);

        assert_eq!(rows.len(), laps.sample_count());
        assert!(rows.iter().all(|r| r.corner_id.is_none() && r.lateral_g == 0.0));

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("samples.jsonl");
        write_samples_jsonl(&path, &rows).unwrap();
        let loaded = serde_jsonlines::json_lines(&path)
            .unwrap()
            .collect::<Result<Vec<SampleRow>, _>>()
            .unwrap();
        assert_eq!(loaded.len(), rows.len());
        assert_eq!(loaded[3].lap_local_index, 3);
    }
}
