use std::path::Path;

use log::{info, warn};

use crate::ApexError;
use crate::coaching::CoachingGenerator;
use crate::config::AnalysisConfig;
use crate::corners::{CornerDetector, LapDetection, Reconciler, Reconciliation};
use crate::report::{
    AnalysisOutcome, AnalysisReport, AnalysisStatistics, NoCornersReason, SampleRow, sample_rows,
};
use crate::scoring::{Scorer, lap_traces};
use crate::telemetry::{SelectedLaps, Session, load_telemetry_jsonl};

/// Everything one analysis run produced. `reconciliation` is only present
/// when corners were detected.
#[derive(Debug)]
pub struct Analysis {
    pub selected: SelectedLaps,
    pub detections: Vec<LapDetection>,
    pub reconciliation: Option<Reconciliation>,
    pub outcome: AnalysisOutcome,
}

impl Analysis {
    pub fn sample_rows(&self) -> Vec<SampleRow> {
        sample_rows(
            &self.selected,
            &self.detections,
            self.reconciliation.as_ref().map(|r| &r.assignments),
        )
    }
}

pub fn analyze_file(input: &Path, config: &AnalysisConfig) -> Result<Analysis, ApexError> {
    let mut session = load_telemetry_jsonl(input)?;
    analyze(&mut session, config)
}

/// Select laps, detect and reconcile corners, then score and coach.
///
/// Input that yields no corners is reported through
/// `AnalysisOutcome::NoCornersDetected`; only broken invariants inside the
/// reconciler surface as errors.
pub fn analyze(session: &mut Session, config: &AnalysisConfig) -> Result<Analysis, ApexError> {
    let selected = session.select(&config.lap_selection);
    if selected.is_empty() {
        warn!("No lap matches the lap selection");
        return Ok(Analysis {
            selected,
            detections: Vec::new(),
            reconciliation: None,
            outcome: AnalysisOutcome::NoCornersDetected {
                reason: NoCornersReason::NoSelectedLaps,
            },
        });
    }

    let detections = CornerDetector::new(config.detection.clone()).detect(&selected);
    let candidate_count = detections.iter().map(|d| d.candidates.len()).sum::<usize>();
    info!(
        "Detected {} corner candidates on {} laps",
        candidate_count,
        detections.len()
    );
    if candidate_count == 0 {
        warn!("No corner detected on any selected lap");
        return Ok(Analysis {
            selected,
            detections,
            reconciliation: None,
            outcome: AnalysisOutcome::NoCornersDetected {
                reason: NoCornersReason::NoCandidates,
            },
        });
    }

    let mut reconciliation =
        Reconciler::new(config.reconcile.clone()).reconcile(&detections, &selected.layout())?;
    info!(
        "Reconciled {} candidates into {} corners ({} discarded)",
        candidate_count,
        reconciliation.corners.len(),
        reconciliation.discarded.len()
    );

    let traces = lap_traces(&selected, &detections);
    let scorer = Scorer::new(config.scoring.clone());
    scorer.score_corners(&mut reconciliation.corners, &traces);
    let score = scorer.score_session(&reconciliation.corners, &traces);
    let advice =
        CoachingGenerator::new(config.coaching.clone()).generate(&reconciliation.corners, &score);
    info!("Generated {} coaching items", advice.len());

    let statistics = AnalysisStatistics {
        selected_laps: selected.laps().iter().map(|l| l.lap_number).collect(),
        reference_lap: reconciliation.reference_lap,
        sample_count: selected.sample_count(),
        candidate_count,
        discarded_count: reconciliation.discarded.len(),
        corner_count: reconciliation.corners.len(),
        distance_tolerance_m: reconciliation.distance_tolerance_m,
    };
    let report = AnalysisReport {
        statistics,
        corners: reconciliation.corners.clone(),
        score,
        advice,
    };

    Ok(Analysis {
        selected,
        detections,
        reconciliation: Some(reconciliation),
        outcome: AnalysisOutcome::Completed(report),
    })
}
