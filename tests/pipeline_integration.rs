// Integration tests for the full analysis pipeline
//
// Sessions are generated on the synthetic kart circuit, written to JSON Lines
// and analyzed through the public API:
// 1. Load telemetry from file
// 2. Detect and reconcile corners
// 3. Score the session and generate coaching advice
// 4. Write the report and sample export

use std::path::{Path, PathBuf};

use apexline::corners::validate_corners;
use apexline::report::{SampleRow, read_report, write_report, write_samples_jsonl};
use apexline::telemetry::TelemetryRecord;
use apexline::telemetry::synthetic::{SyntheticTrack, straight_lap_records};
use apexline::{AnalysisConfig, AnalysisOutcome, Direction, NoCornersReason, analyze_file};
use tempfile::TempDir;

fn write_session(dir: &Path, records: &[TelemetryRecord]) -> PathBuf {
    let path = dir.join("session.jsonl");
    serde_jsonlines::write_json_lines(&path, records).unwrap();
    path
}

fn circuit_session(laps: &[(u32, f64)]) -> Vec<TelemetryRecord> {
    SyntheticTrack::kart_circuit().session_records(laps)
}

#[test]
fn test_full_session_analysis() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_session(
        temp_dir.path(),
        &circuit_session(&[(1, 1.0), (2, 0.96), (3, 1.03), (4, 0.99)]),
    );

    let analysis = analyze_file(&input, &AnalysisConfig::default()).unwrap();
    let report = analysis.outcome.report().unwrap();

    let directions = report.corners.iter().map(|c| c.direction).collect::<Vec<_>>();
    assert_eq!(
        directions,
        vec![
            Direction::Left,
            Direction::Left,
            Direction::Right,
            Direction::Left,
            Direction::Left
        ]
    );
    validate_corners(&report.corners).unwrap();
    for corner in &report.corners {
        assert_eq!(corner.laps().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let metrics = corner.metrics.as_ref().unwrap();
        assert_eq!(metrics.laps_with_data, 4);
        assert!((0.0..=100.0).contains(&metrics.score));
    }

    let statistics = &report.statistics;
    assert_eq!(statistics.corner_count, 5);
    assert_eq!(statistics.candidate_count, 20);
    assert_eq!(statistics.discarded_count, 0);

    assert!((0.0..=100.0).contains(&report.score.overall_score));
    let priorities = report.advice.iter().map(|a| a.priority).collect::<Vec<_>>();
    assert_eq!(priorities, (1..=report.advice.len() as u32).collect::<Vec<_>>());
}

#[test]
fn test_straight_lap_does_not_change_corner_count() {
    let temp_dir = TempDir::new().unwrap();
    let mut records = circuit_session(&[(1, 1.0), (2, 0.98)]);
    let start = records.last().unwrap().timestamp_s + 0.1;
    records.extend(straight_lap_records(3, start, 600.0, 60.0));
    let input = write_session(temp_dir.path(), &records);

    let analysis = analyze_file(&input, &AnalysisConfig::default()).unwrap();
    let report = analysis.outcome.report().unwrap();

    assert_eq!(report.corners.len(), 5);
    assert_eq!(report.statistics.selected_laps, vec![1, 2, 3]);
    assert!(report.corners.iter().all(|c| !c.per_lap_data.contains_key(&3)));
    let straight = analysis.detections.iter().find(|d| d.lap_number == 3).unwrap();
    assert!(straight.candidates.is_empty());
}

#[test]
fn test_lap_subset_moves_reference_lap() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_session(
        temp_dir.path(),
        &circuit_session(&[(1, 1.0), (2, 0.97), (3, 1.01)]),
    );
    let mut config = AnalysisConfig::default();
    config.lap_selection.laps = Some(vec![2, 3]);

    let analysis = analyze_file(&input, &config).unwrap();
    let report = analysis.outcome.report().unwrap();
    assert_eq!(report.statistics.reference_lap, Some(2));
    assert_eq!(report.corners.len(), 5);
    assert!(report.corners.iter().all(|c| !c.per_lap_data.contains_key(&1)));
}

#[test]
fn test_only_straight_laps_report_no_corners() {
    let temp_dir = TempDir::new().unwrap();
    let mut records = straight_lap_records(1, 0.0, 400.0, 55.0);
    records.extend(straight_lap_records(2, 40.0, 400.0, 55.0));
    let input = write_session(temp_dir.path(), &records);

    let analysis = analyze_file(&input, &AnalysisConfig::default()).unwrap();
    assert_eq!(
        analysis.outcome,
        AnalysisOutcome::NoCornersDetected {
            reason: NoCornersReason::NoCandidates
        }
    );
}

#[test]
fn test_report_and_samples_are_written() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_session(temp_dir.path(), &circuit_session(&[(1, 1.0), (2, 0.97)]));
    let analysis = analyze_file(&input, &AnalysisConfig::default()).unwrap();

    let report_path = temp_dir.path().join("report.json");
    write_report(&report_path, &analysis.outcome).unwrap();
    let loaded = read_report(&report_path).unwrap();
    let loaded = loaded.report().unwrap();
    let original = analysis.outcome.report().unwrap();
    assert_eq!(loaded.corners.len(), original.corners.len());
    assert_eq!(loaded.statistics.selected_laps, original.statistics.selected_laps);
    assert_eq!(loaded.advice.len(), original.advice.len());
    assert_eq!(loaded.score.grade, original.score.grade);

    let samples_path = temp_dir.path().join("samples.jsonl");
    let rows = analysis.sample_rows();
    write_samples_jsonl(&samples_path, &rows).unwrap();
    let exported = serde_jsonlines::json_lines(&samples_path)
        .unwrap()
        .collect::<Result<Vec<SampleRow>, _>>()
        .unwrap();
    assert_eq!(exported.len(), analysis.selected.sample_count());
    assert!(exported.iter().any(|r| r.corner_id == Some(5)));
    assert!(
        exported
            .windows(2)
            .all(|w| w[1].global_index == w[0].global_index + 1)
    );
}

#[test]
fn test_missing_input_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = analyze_file(&temp_dir.path().join("nope.jsonl"), &AnalysisConfig::default());
    assert!(matches!(
        result,
        Err(apexline::ApexError::InvalidTelemetryFile { .. })
    ));
}
