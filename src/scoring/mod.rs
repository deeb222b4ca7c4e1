mod corner_metrics;

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::corners::{Corner, LapDetection};
use crate::geometry::{LapGeometry, kmh_to_mps};
use crate::telemetry::{Sample, SelectedLaps};

pub use corner_metrics::{
    ApexTiming, CornerGrade, CornerMetrics, apex_speed_efficiency, corner_score,
};

const MAX_APEX_PRECISION: f64 = 30.0;
const MAX_CONSISTENCY: f64 = 20.0;
const MAX_APEX_SPEED: f64 = 25.0;
const MAX_SECTOR_TIMES: f64 = 25.0;
/// Apex error at which precision points reach zero
const MAX_APEX_ERROR_M: f64 = 5.0;
const FAST_CORNER_WEIGHT: f64 = 0.7;
const SLOW_CORNER_WEIGHT: f64 = 0.3;
/// Share of the lap's top speed used as the theoretical sector speed
const SECTOR_REFERENCE_SPEED_SHARE: f64 = 0.7;
const UNTIMED_SECTOR_RATIO: f64 = 0.8;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Tyre grip used in the friction-circle model
    pub friction_coefficient: f64,
    pub max_braking_decel_g: f64,
    /// Optimal apex speeds outside this range fall back to the best
    /// observed apex speed
    pub min_optimal_speed_kmh: f64,
    pub max_optimal_speed_kmh: f64,
    /// Corners faster than this weigh more in the apex speed sub-score
    pub fast_corner_speed_kmh: f64,
    pub sector_count: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            friction_coefficient: 1.1,
            max_braking_decel_g: 1.5,
            min_optimal_speed_kmh: 30.0,
            max_optimal_speed_kmh: 150.0,
            fast_corner_speed_kmh: 60.0,
            sector_count: 3,
        }
    }
}

/// Samples and geometry of one selected lap, as read by the scorer.
#[derive(Clone, Copy, Debug)]
pub struct LapTrace<'a> {
    pub lap_number: u32,
    pub lap_time_s: f64,
    pub samples: &'a [Sample],
    pub geometry: &'a LapGeometry,
}

/// Pair every selected lap with its detected geometry.
pub fn lap_traces<'a>(
    laps: &'a SelectedLaps,
    detections: &'a [LapDetection],
) -> BTreeMap<u32, LapTrace<'a>> {
    laps.laps()
        .iter()
        .filter_map(|lap| {
            let detection = detections.iter().find(|d| d.lap_number == lap.lap_number)?;
            Some((
                lap.lap_number,
                LapTrace {
                    lap_number: lap.lap_number,
                    lap_time_s: lap.lap_time_s,
                    samples: &lap.samples,
                    geometry: &detection.geometry,
                },
            ))
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            Grade::APlus
        } else if score >= 85.0 {
            Grade::A
        } else if score >= 75.0 {
            Grade::B
        } else if score >= 65.0 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 0 to 30
    pub apex_precision: f64,
    /// 0 to 20
    pub trajectory_consistency: f64,
    /// 0 to 25
    pub apex_speed: f64,
    /// 0 to 25
    pub sector_times: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.apex_precision + self.trajectory_consistency + self.apex_speed + self.sector_times
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    /// Ids of the three best corners, best first
    pub best_corners: Vec<u32>,
    /// Ids of the three worst corners, worst first
    pub worst_corners: Vec<u32>,
    pub average_apex_error_m: f64,
    pub average_efficiency: f64,
    pub consistency_index: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionScore {
    pub overall_score: f64,
    pub grade: Grade,
    pub percentile: u32,
    pub breakdown: ScoreBreakdown,
    pub details: ScoreDetails,
}

pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Fill in `metrics` on every corner some lap trace covers.
    pub fn score_corners(&self, corners: &mut [Corner], traces: &BTreeMap<u32, LapTrace<'_>>) {
        for corner in corners.iter_mut() {
            corner.metrics = corner_metrics::measure_corner(corner, traces, &self.config);
            match &corner.metrics {
                Some(metrics) => debug!(
                    "{}: apex {:.1}/{:.1} km/h, error {:.2} m, lost {:.2} s, grade {:?}",
                    corner.label(),
                    metrics.apex_speed_kmh,
                    metrics.optimal_apex_speed_kmh,
                    metrics.apex_distance_error_m,
                    metrics.time_lost_s,
                    metrics.grade
                ),
                None => debug!("{}: no lap trace covers this corner", corner.label()),
            }
        }
    }

    /// Aggregate score of the session from the scored corners.
    pub fn score_session(
        &self,
        corners: &[Corner],
        traces: &BTreeMap<u32, LapTrace<'_>>,
    ) -> SessionScore {
        let scored = corners
            .iter()
            .filter_map(|c| c.metrics.as_ref().map(|m| (c.corner_id, m)))
            .collect::<Vec<_>>();

        let breakdown = ScoreBreakdown {
            apex_precision: apex_precision_score(&scored),
            trajectory_consistency: consistency_score(&scored),
            apex_speed: self.apex_speed_score(&scored),
            sector_times: self.sector_times_score(traces),
        };
        let overall_score = breakdown.total();

        let ranked = scored
            .iter()
            .sorted_by(|(id_a, a), (id_b, b)| b.score.total_cmp(&a.score).then(id_a.cmp(id_b)))
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        let details = ScoreDetails {
            best_corners: ranked.iter().take(3).copied().collect(),
            worst_corners: ranked.iter().rev().take(3).copied().collect(),
            average_apex_error_m: average(scored.iter().map(|(_, m)| m.apex_distance_error_m)),
            average_efficiency: average(scored.iter().map(|(_, m)| m.apex_speed_efficiency)),
            consistency_index: breakdown.trajectory_consistency / MAX_CONSISTENCY,
        };

        let grade = Grade::from_score(overall_score);
        info!(
            "Session score {:.1} ({}) over {} scored corners",
            overall_score,
            grade,
            scored.len()
        );
        SessionScore {
            overall_score,
            grade,
            percentile: percentile(overall_score),
            breakdown,
            details,
        }
    }

    fn apex_speed_score(&self, scored: &[(u32, &CornerMetrics)]) -> f64 {
        if scored.is_empty() {
            return MAX_APEX_SPEED / 2.0;
        }
        let (points, weights) = scored.iter().fold((0.0, 0.0), |(points, weights), (_, m)| {
            let weight = if m.apex_speed_kmh > self.config.fast_corner_speed_kmh {
                FAST_CORNER_WEIGHT
            } else {
                SLOW_CORNER_WEIGHT
            };
            (
                points + MAX_APEX_SPEED * m.apex_speed_efficiency * weight,
                weights + weight,
            )
        });
        (points / weights).min(MAX_APEX_SPEED)
    }

    /// Sector times of the fastest lap against a lap driven at a fixed share
    /// of its top speed.
    fn sector_times_score(&self, traces: &BTreeMap<u32, LapTrace<'_>>) -> f64 {
        let default = MAX_SECTOR_TIMES / 2.0;
        let Some(lap) = traces
            .values()
            .filter(|t| t.samples.len() > 1 && t.geometry.len() == t.samples.len())
            .min_by(|a, b| a.lap_time_s.total_cmp(&b.lap_time_s))
        else {
            return default;
        };
        let sectors = self.config.sector_count;
        let total_distance = lap.geometry.total_distance();
        let max_speed_kmh = lap.samples.iter().map(|s| s.speed_kmh).fold(0.0, f64::max);
        let reference_speed = kmh_to_mps(max_speed_kmh * SECTOR_REFERENCE_SPEED_SHARE);
        if sectors == 0 || total_distance <= 0.0 || lap.lap_time_s <= 0.0 || reference_speed <= 0.0
        {
            return default;
        }

        let closest_sample = |distance: f64| {
            lap.geometry
                .cumulative_distance
                .iter()
                .position_min_by(|a, b| (*a - distance).abs().total_cmp(&(*b - distance).abs()))
                .unwrap_or(0)
        };
        let mut boundaries = (1..sectors)
            .map(|k| closest_sample(total_distance * k as f64 / sectors as f64))
            .collect::<Vec<_>>();
        boundaries.insert(0, 0);
        boundaries.push(lap.samples.len() - 1);

        let sector_length = total_distance / sectors as f64;
        let theoretical = sector_length / reference_speed;
        let ratio = boundaries
            .iter()
            .tuple_windows()
            .map(|(&from, &to)| {
                let time = lap.samples[to].timestamp_s - lap.samples[from].timestamp_s;
                if time > 0.0 {
                    (theoretical / time).min(1.0)
                } else {
                    UNTIMED_SECTOR_RATIO
                }
            })
            .sum::<f64>()
            / sectors as f64;
        sector_points(ratio)
    }
}

/// Points for the mean theoretical/actual sector time ratio.
pub fn sector_points(ratio: f64) -> f64 {
    if ratio >= 1.0 {
        25.0
    } else if ratio >= 0.95 {
        22.0
    } else if ratio >= 0.90 {
        18.0
    } else if ratio >= 0.85 {
        12.0
    } else {
        (5.0 * ratio / 0.85).max(5.0)
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn apex_precision_score(scored: &[(u32, &CornerMetrics)]) -> f64 {
    if scored.is_empty() {
        return MAX_APEX_PRECISION / 2.0;
    }
    let mean_error = average(scored.iter().map(|(_, m)| m.apex_distance_error_m));
    MAX_APEX_PRECISION * (1.0 - (mean_error / MAX_APEX_ERROR_M).min(1.0))
}

fn consistency_score(scored: &[(u32, &CornerMetrics)]) -> f64 {
    if scored.is_empty() {
        return MAX_CONSISTENCY / 2.0;
    }
    MAX_CONSISTENCY * average(scored.iter().map(|(_, m)| m.consistency))
}

pub fn percentile(overall_score: f64) -> u32 {
    (10.0 + (overall_score - 50.0) * 1.5).clamp(10.0, 99.0) as u32
}
