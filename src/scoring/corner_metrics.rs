use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LapTrace, ScoringConfig};
use crate::corners::{Corner, CornerLapData};
use crate::geometry::{GRAVITY_MPS2, MIN_CURVATURE, kmh_to_mps, mps_to_kmh, sample_distance};

/// Samples on each side of the apex used for entry and exit speed
const SPEED_WINDOW_SAMPLES: usize = 15;
const MIN_SPEED_WINDOW_SAMPLES: usize = 5;
/// Speed drop between consecutive samples that marks the braking point
const BRAKING_DROP_KMH: f64 = 2.0;
/// Braking distance estimate, as a share of entry-to-apex, when no braking
/// point is found
const DEFAULT_BRAKING_SHARE: f64 = 0.6;
const ON_POINT_TOLERANCE_M: f64 = 0.5;
const MAX_TIME_LOST_S: f64 = 5.0;
/// Coefficient of variation of apex speeds that zeroes consistency
const MAX_APEX_SPEED_CV: f64 = 0.15;
const SINGLE_LAP_CONSISTENCY: f64 = 0.5;
/// Samples slower than this are left out of the time-lost integral
const MIN_INTEGRATION_SPEED_MPS: f64 = 0.5;

/// Where the driver's apex sits relative to the point of maximum curvature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApexTiming {
    Early,
    Late,
    OnPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CornerGrade {
    A,
    B,
    C,
    D,
    F,
}

impl CornerGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            CornerGrade::A
        } else if score >= 68.0 {
            CornerGrade::B
        } else if score >= 52.0 {
            CornerGrade::C
        } else if score >= 38.0 {
            CornerGrade::D
        } else {
            CornerGrade::F
        }
    }
}

/// Performance of the driver through one corner, averaged over the laps
/// with data for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerMetrics {
    pub laps_with_data: usize,
    pub apex_speed_kmh: f64,
    pub optimal_apex_speed_kmh: f64,
    /// Achieved over optimal apex speed, capped at 1
    pub apex_speed_efficiency: f64,
    pub apex_distance_error_m: f64,
    pub apex_timing: ApexTiming,
    pub entry_speed_kmh: Option<f64>,
    pub exit_speed_kmh: Option<f64>,
    pub braking_distance_m: f64,
    pub optimal_braking_distance_m: f64,
    /// Positive when braking earlier than needed
    pub braking_delta_m: f64,
    pub time_lost_s: f64,
    /// 1 for identical apex speeds on every lap
    pub consistency: f64,
    pub max_lateral_g: f64,
    pub optimal_lateral_g: f64,
    pub time_in_corner_s: f64,
    pub score: f64,
    pub grade: CornerGrade,
}

pub fn apex_speed_efficiency(apex_speed_kmh: f64, optimal_apex_speed_kmh: f64) -> f64 {
    if optimal_apex_speed_kmh <= 0.0 {
        return 1.0;
    }
    (apex_speed_kmh / optimal_apex_speed_kmh).clamp(0.0, 1.0)
}

/// Score of a single corner out of 100.
pub fn corner_score(efficiency: f64, apex_error_m: f64, max_lateral_g: f64, time_lost_s: f64) -> f64 {
    0.4 * efficiency * 100.0
        + 30.0 * (1.0 - (apex_error_m / 5.0).min(1.0))
        + 20.0 * (max_lateral_g / 3.0).clamp(0.0, 1.0)
        + 10.0 * (1.0 - time_lost_s.clamp(0.0, 1.0))
}

/// What one lap tells about one corner
#[derive(Clone, Debug)]
struct LapMeasurement {
    apex_speed_kmh: f64,
    mean_abs_curvature: f64,
    apex_error_m: f64,
    /// Detected apex distance minus ideal apex distance
    apex_offset_m: f64,
    entry_speed_kmh: Option<f64>,
    exit_speed_kmh: Option<f64>,
    braking_distance_m: f64,
    /// `(segment length m, speed km/h)` for each step through the corner
    speed_profile: Vec<(f64, f64)>,
    max_lateral_g: f64,
    time_in_corner_s: f64,
}

fn weighted_mean(values: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, weights) = values.fold((0.0, 0.0), |(sum, weights), (value, weight)| {
        (sum + value * weight, weights + weight)
    });
    (weights > 0.0).then(|| sum / weights)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn measure_lap(data: &CornerLapData, trace: &LapTrace<'_>) -> Option<LapMeasurement> {
    let (entry, apex, exit) = (
        data.entry_local_index,
        data.apex_local_index,
        data.exit_local_index,
    );
    let samples = trace.samples;
    let geometry = trace.geometry;
    if exit >= samples.len() || exit >= geometry.len() || entry > apex || apex > exit {
        return None;
    }
    let speed = |i: usize| samples[i].speed_kmh;

    let apex_speed_kmh = (entry..=exit).map(speed).fold(f64::INFINITY, f64::min);
    let mean_abs_curvature = geometry.curvature[entry..=exit]
        .iter()
        .map(|k| k.abs())
        .sum::<f64>()
        / (exit - entry + 1) as f64;

    let mut ideal = entry;
    for i in entry..=exit {
        if geometry.curvature[i].abs() > geometry.curvature[ideal].abs() {
            ideal = i;
        }
    }

    let before = apex.saturating_sub(SPEED_WINDOW_SAMPLES)..apex;
    let after = (apex + 1)..(apex + SPEED_WINDOW_SAMPLES + 1).min(samples.len());
    let entry_speed_kmh = (before.len() >= MIN_SPEED_WINDOW_SAMPLES)
        .then(|| {
            weighted_mean(
                before
                    .clone()
                    .enumerate()
                    .map(|(w, i)| (speed(i), (w + 1) as f64)),
            )
        })
        .flatten();
    let exit_speed_kmh = (after.len() >= MIN_SPEED_WINDOW_SAMPLES)
        .then(|| {
            let count = after.len();
            weighted_mean(
                after
                    .clone()
                    .enumerate()
                    .map(|(w, i)| (speed(i), (count - w) as f64)),
            )
        })
        .flatten();

    let braking_point = (entry..apex).find(|&i| speed(i + 1) - speed(i) < -BRAKING_DROP_KMH);
    let braking_distance_m = match braking_point {
        Some(i) => geometry.distance_between(i, apex),
        None => geometry.distance_between(entry, apex) * DEFAULT_BRAKING_SHARE,
    };

    Some(LapMeasurement {
        apex_speed_kmh,
        mean_abs_curvature,
        apex_error_m: sample_distance(&samples[apex], &samples[ideal]),
        apex_offset_m: geometry.distance_between(ideal, apex),
        entry_speed_kmh,
        exit_speed_kmh,
        braking_distance_m,
        speed_profile: ((entry + 1)..=exit)
            .map(|i| (geometry.distance_between(i - 1, i), speed(i)))
            .collect(),
        max_lateral_g: geometry.lateral_g[entry..=exit]
            .iter()
            .map(|g| g.abs())
            .fold(0.0, f64::max),
        time_in_corner_s: samples[exit].timestamp_s - samples[entry].timestamp_s,
    })
}

/// Time spent through the corner beyond the optimal speed profile, where
/// the optimal profile never drops below the optimal apex speed.
fn time_lost(speed_profile: &[(f64, f64)], optimal_apex_speed_kmh: f64) -> f64 {
    let optimal_mps = kmh_to_mps(optimal_apex_speed_kmh);
    speed_profile
        .iter()
        .map(|(ds, speed_kmh)| (ds, kmh_to_mps(*speed_kmh)))
        .filter(|(_, v)| *v > MIN_INTEGRATION_SPEED_MPS)
        .map(|(ds, v)| ds * (1.0 / v - 1.0 / v.max(optimal_mps)))
        .sum()
}

fn consistency(apex_speeds: &[f64]) -> f64 {
    if apex_speeds.len() < 2 {
        return SINGLE_LAP_CONSISTENCY;
    }
    let Some(mean) = mean(apex_speeds).filter(|m| *m > 0.0) else {
        return 0.0;
    };
    let variance =
        apex_speeds.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / apex_speeds.len() as f64;
    let cv = variance.sqrt() / mean;
    1.0 - (cv / MAX_APEX_SPEED_CV).min(1.0)
}

/// Metrics for one canonical corner, or `None` when no lap trace covers it.
pub(crate) fn measure_corner(
    corner: &Corner,
    traces: &BTreeMap<u32, LapTrace<'_>>,
    config: &ScoringConfig,
) -> Option<CornerMetrics> {
    let measurements = corner
        .per_lap_data
        .iter()
        .filter_map(|(lap_number, data)| measure_lap(data, traces.get(lap_number)?))
        .collect::<Vec<_>>();
    if measurements.is_empty() {
        return None;
    }

    let apex_speeds = measurements.iter().map(|m| m.apex_speed_kmh).collect::<Vec<_>>();
    let apex_speed_kmh = mean(&apex_speeds)?;
    let best_apex_speed_kmh = apex_speeds.iter().copied().fold(0.0, f64::max);

    let mean_curvature = mean(
        &measurements
            .iter()
            .map(|m| m.mean_abs_curvature)
            .collect::<Vec<_>>(),
    )?;
    let radius_m = (mean_curvature > MIN_CURVATURE).then(|| 1.0 / mean_curvature);
    let optimal_apex_speed_kmh = radius_m
        .map(|r| mps_to_kmh((config.friction_coefficient * GRAVITY_MPS2 * r).sqrt()))
        .filter(|v| *v > config.min_optimal_speed_kmh && *v < config.max_optimal_speed_kmh)
        .unwrap_or(best_apex_speed_kmh);
    let efficiency = apex_speed_efficiency(apex_speed_kmh, optimal_apex_speed_kmh);

    let apex_distance_error_m =
        mean(&measurements.iter().map(|m| m.apex_error_m).collect::<Vec<_>>())?;
    let apex_offset_m = mean(&measurements.iter().map(|m| m.apex_offset_m).collect::<Vec<_>>())?;
    let apex_timing = if apex_offset_m < -ON_POINT_TOLERANCE_M {
        ApexTiming::Early
    } else if apex_offset_m > ON_POINT_TOLERANCE_M {
        ApexTiming::Late
    } else {
        ApexTiming::OnPoint
    };

    let entry_speed_kmh = mean(
        &measurements
            .iter()
            .filter_map(|m| m.entry_speed_kmh)
            .collect::<Vec<_>>(),
    );
    let exit_speed_kmh = mean(
        &measurements
            .iter()
            .filter_map(|m| m.exit_speed_kmh)
            .collect::<Vec<_>>(),
    );

    let braking_distance_m = mean(
        &measurements
            .iter()
            .map(|m| m.braking_distance_m)
            .collect::<Vec<_>>(),
    )?;
    let optimal_braking_distance_m = match entry_speed_kmh {
        Some(entry) if entry > apex_speed_kmh => {
            let (ve, va) = (kmh_to_mps(entry), kmh_to_mps(apex_speed_kmh));
            (ve * ve - va * va) / (2.0 * config.max_braking_decel_g * GRAVITY_MPS2)
        }
        _ => braking_distance_m,
    };

    let time_lost_s = mean(
        &measurements
            .iter()
            .map(|m| time_lost(&m.speed_profile, optimal_apex_speed_kmh))
            .collect::<Vec<_>>(),
    )?
    .clamp(0.0, MAX_TIME_LOST_S);

    let max_lateral_g = measurements.iter().map(|m| m.max_lateral_g).fold(0.0, f64::max);
    let optimal_lateral_g = radius_m
        .map(|r| kmh_to_mps(optimal_apex_speed_kmh).powi(2) / (GRAVITY_MPS2 * r))
        .unwrap_or(max_lateral_g);
    let time_in_corner_s = mean(
        &measurements
            .iter()
            .map(|m| m.time_in_corner_s)
            .collect::<Vec<_>>(),
    )?;

    let score = corner_score(efficiency, apex_distance_error_m, max_lateral_g, time_lost_s);
    Some(CornerMetrics {
        laps_with_data: measurements.len(),
        apex_speed_kmh,
        optimal_apex_speed_kmh,
        apex_speed_efficiency: efficiency,
        apex_distance_error_m,
        apex_timing,
        entry_speed_kmh,
        exit_speed_kmh,
        braking_distance_m,
        optimal_braking_distance_m,
        braking_delta_m: braking_distance_m - optimal_braking_distance_m,
        time_lost_s,
        consistency: consistency(&apex_speeds),
        max_lateral_g,
        optimal_lateral_g,
        time_in_corner_s,
        score,
        grade: CornerGrade::from_score(score),
    })
}
