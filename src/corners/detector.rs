use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{CornerCandidate, Direction};
use crate::geometry::{LapGeometry, analyze_lap};
use crate::telemetry::{Sample, SelectedLap, SelectedLaps};

/// Thresholds of the lateral-acceleration hysteresis used to cut a lap into
/// corner segments, and the noise filters applied to each segment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// A corner opens when |lateral g| reaches this value
    pub entry_lateral_g: f64,
    /// An open corner closes when |lateral g| drops below this value
    pub exit_lateral_g: f64,
    pub min_corner_samples: usize,
    pub min_corner_distance_m: f64,
    pub min_corner_duration_s: f64,
    /// Laps with fewer samples yield no candidates
    pub min_lap_samples: usize,
    /// Detect laps on scoped threads
    pub parallel: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            entry_lateral_g: 0.25,
            exit_lateral_g: 0.18,
            min_corner_samples: 3,
            min_corner_distance_m: 5.0,
            min_corner_duration_s: 0.3,
            min_lap_samples: 10,
            parallel: true,
        }
    }
}

/// Geometry and corner candidates of one lap.
#[derive(Clone, Debug, PartialEq)]
pub struct LapDetection {
    pub lap_number: u32,
    pub geometry: LapGeometry,
    /// Sorted by entry index, provisional ids 1..k in that order
    pub candidates: Vec<CornerCandidate>,
}

impl LapDetection {
    fn empty(lap_number: u32) -> Self {
        Self {
            lap_number,
            geometry: LapGeometry::default(),
            candidates: Vec::new(),
        }
    }
}

pub struct CornerDetector {
    config: DetectionConfig,
}

impl CornerDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Detect corners on every selected lap. Laps are independent of each
    /// other; the result is in lap order.
    pub fn detect(&self, laps: &SelectedLaps) -> Vec<LapDetection> {
        if !self.config.parallel || laps.laps().len() < 2 {
            return laps.laps().iter().map(|lap| self.detect_lap(lap)).collect();
        }

        std::thread::scope(|scope| {
            let handles = laps
                .laps()
                .iter()
                .map(|lap| (lap.lap_number, scope.spawn(move || self.detect_lap(lap))))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(lap_number, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        warn!("Corner detection failed on lap {}, skipping it", lap_number);
                        LapDetection::empty(lap_number)
                    })
                })
                .collect()
        })
    }

    pub fn detect_lap(&self, lap: &SelectedLap) -> LapDetection {
        if lap.samples.len() < self.config.min_lap_samples {
            warn!(
                "Lap {} has {} samples, at least {} are needed for corner detection",
                lap.lap_number,
                lap.samples.len(),
                self.config.min_lap_samples
            );
            return LapDetection {
                lap_number: lap.lap_number,
                geometry: analyze_lap(&lap.samples),
                candidates: Vec::new(),
            };
        }

        let geometry = analyze_lap(&lap.samples);
        let candidates = self.segment(lap.lap_number, &lap.samples, &geometry);
        debug!(
            "Lap {}: {} corner candidates over {:.1} m",
            lap.lap_number,
            candidates.len(),
            geometry.total_distance()
        );
        LapDetection {
            lap_number: lap.lap_number,
            geometry,
            candidates,
        }
    }

    /// Cut the lap into segments where |lateral g| stays above the exit
    /// threshold after reaching the entry threshold. A change of sign closes
    /// the open segment.
    fn segment(
        &self,
        lap_number: u32,
        samples: &[Sample],
        geometry: &LapGeometry,
    ) -> Vec<CornerCandidate> {
        let lateral_g = &geometry.lateral_g;
        let mut ranges = Vec::new();
        let mut open: Option<(usize, f64)> = None;

        for (i, g) in lateral_g.iter().enumerate() {
            let magnitude = g.abs();
            match open {
                None => {
                    if magnitude >= self.config.entry_lateral_g {
                        open = Some((i, g.signum()));
                    }
                }
                Some((start, sign)) => {
                    if magnitude < self.config.exit_lateral_g {
                        ranges.push((start, i - 1));
                        open = None;
                    } else if g.signum() != sign {
                        ranges.push((start, i - 1));
                        open = (magnitude >= self.config.entry_lateral_g).then(|| (i, g.signum()));
                    }
                }
            }
        }
        if let Some((start, _)) = open {
            ranges.push((start, lateral_g.len() - 1));
        }

        ranges
            .into_iter()
            .filter(|(start, end)| self.is_corner(samples, geometry, *start, *end))
            .enumerate()
            .map(|(position, (start, end))| CornerCandidate {
                lap_number,
                provisional_id: position as u32 + 1,
                entry_local_index: start,
                apex_local_index: apex_index(lateral_g, start, end),
                exit_local_index: end,
                direction: direction(geometry, start, end),
            })
            .collect()
    }

    fn is_corner(&self, samples: &[Sample], geometry: &LapGeometry, start: usize, end: usize) -> bool {
        let sample_count = end - start + 1;
        let distance = geometry.distance_between(start, end);
        let duration = samples[end].timestamp_s - samples[start].timestamp_s;
        sample_count >= self.config.min_corner_samples
            && distance >= self.config.min_corner_distance_m
            && duration >= self.config.min_corner_duration_s
    }
}

/// Index of the largest |lateral g| in `start..=end`, first one on ties
fn apex_index(lateral_g: &[f64], start: usize, end: usize) -> usize {
    let mut apex = start;
    for i in start..=end {
        if lateral_g[i].abs() > lateral_g[apex].abs() {
            apex = i;
        }
    }
    apex
}

fn direction(geometry: &LapGeometry, start: usize, end: usize) -> Direction {
    let net_heading_change = geometry.heading[end] - geometry.heading[start];
    if net_heading_change.abs() > f64::EPSILON {
        return Direction::from_sign(net_heading_change);
    }
    let mean_curvature =
        geometry.curvature[start..=end].iter().sum::<f64>() / (end - start + 1) as f64;
    Direction::from_sign(mean_curvature)
}
