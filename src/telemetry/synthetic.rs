//! Synthetic circuit generator used by tests and benchmarks.
//!
//! Corners follow a half-sine curvature profile so every corner has a single
//! well-defined apex at its middle, with the speed dipping to the apex speed
//! there. Positions are generated in a local east/north frame and projected
//! to latitude/longitude around a fixed origin.

use std::f64::consts::PI;

use super::TelemetryRecord;
use crate::geometry::EARTH_RADIUS_M;

const ORIGIN_LAT: f64 = 45.0;
const ORIGIN_LON: f64 = 7.0;
const PATH_STEP_M: f64 = 0.05;
const SAMPLE_PERIOD_S: f64 = 0.1;
/// Distance over which the kart brakes into / accelerates out of a corner
const SPEED_RAMP_M: f64 = 25.0;
/// Speed at the corner edges relative to the apex speed
const CORNER_EDGE_SPEED_FACTOR: f64 = 0.15;

#[derive(Clone, Debug, PartialEq)]
pub enum TrackSegment {
    Straight {
        length_m: f64,
    },
    /// `angle_deg` is positive for a left-hand corner
    Corner {
        min_radius_m: f64,
        angle_deg: f64,
        apex_speed_kmh: f64,
    },
}

impl TrackSegment {
    fn length_m(&self) -> f64 {
        match self {
            TrackSegment::Straight { length_m } => *length_m,
            TrackSegment::Corner {
                min_radius_m,
                angle_deg,
                ..
            } => angle_deg.to_radians().abs() * PI * min_radius_m / 2.0,
        }
    }

    fn entry_speed_kmh(&self) -> Option<f64> {
        match self {
            TrackSegment::Corner { apex_speed_kmh, .. } => {
                Some(apex_speed_kmh * (1.0 + CORNER_EDGE_SPEED_FACTOR))
            }
            TrackSegment::Straight { .. } => None,
        }
    }
}

/// Convert a local east/north offset (metres) to latitude/longitude.
pub fn local_to_geodetic(east_m: f64, north_m: f64) -> (f64, f64) {
    let lat = ORIGIN_LAT + (north_m / EARTH_RADIUS_M).to_degrees();
    let lon = ORIGIN_LON + (east_m / (EARTH_RADIUS_M * ORIGIN_LAT.to_radians().cos())).to_degrees();
    (lat, lon)
}

#[derive(Clone, Debug)]
pub struct SyntheticTrack {
    straight_speed_kmh: f64,
    segments: Vec<TrackSegment>,
}

impl SyntheticTrack {
    pub fn new(straight_speed_kmh: f64) -> Self {
        Self {
            straight_speed_kmh,
            segments: Vec::new(),
        }
    }

    pub fn straight(mut self, length_m: f64) -> Self {
        self.segments.push(TrackSegment::Straight { length_m });
        self
    }

    pub fn corner(mut self, min_radius_m: f64, angle_deg: f64, apex_speed_kmh: f64) -> Self {
        self.segments.push(TrackSegment::Corner {
            min_radius_m,
            angle_deg,
            apex_speed_kmh,
        });
        self
    }

    /// A five-corner kart circuit: four left-handers (one of them a hairpin)
    /// and one right-hander.
    pub fn kart_circuit() -> Self {
        Self::new(60.0)
            .straight(110.0)
            .corner(15.0, 90.0, 34.0)
            .straight(55.0)
            .corner(25.0, 90.0, 44.0)
            .straight(45.0)
            .corner(12.0, -90.0, 30.0)
            .straight(45.0)
            .corner(18.0, 180.0, 38.0)
            .straight(75.0)
            .corner(30.0, 90.0, 48.0)
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    pub fn length_m(&self) -> f64 {
        self.segments.iter().map(TrackSegment::length_m).sum()
    }

    pub fn corner_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, TrackSegment::Corner { .. }))
            .count()
    }

    fn segment_at(&self, s: f64) -> (usize, f64) {
        let mut start = 0.0;
        for (idx, segment) in self.segments.iter().enumerate() {
            let length = segment.length_m();
            if s < start + length {
                return (idx, s - start);
            }
            start += length;
        }
        let last = self.segments.len().saturating_sub(1);
        (
            last,
            self.segments.get(last).map(TrackSegment::length_m).unwrap_or(0.0),
        )
    }

    fn curvature_at(&self, s: f64) -> f64 {
        let (idx, d) = self.segment_at(s);
        match &self.segments[idx] {
            TrackSegment::Straight { .. } => 0.0,
            segment @ TrackSegment::Corner {
                min_radius_m,
                angle_deg,
                ..
            } => angle_deg.signum() / min_radius_m * (PI * d / segment.length_m()).sin(),
        }
    }

    fn speed_kmh_at(&self, s: f64) -> f64 {
        let (idx, d) = self.segment_at(s);
        let count = self.segments.len();
        match &self.segments[idx] {
            segment @ TrackSegment::Corner { apex_speed_kmh, .. } => {
                let phase = (PI * d / segment.length_m()).sin();
                apex_speed_kmh * (1.0 + CORNER_EDGE_SPEED_FACTOR * (1.0 - phase))
            }
            TrackSegment::Straight { length_m } => {
                let mut speed = self.straight_speed_kmh;
                let next = &self.segments[(idx + 1) % count];
                if let Some(entry) = next.entry_speed_kmh() {
                    let to_go = length_m - d;
                    if to_go < SPEED_RAMP_M {
                        let t = to_go / SPEED_RAMP_M;
                        speed = speed.min(entry + (self.straight_speed_kmh - entry) * t);
                    }
                }
                let prev = &self.segments[(idx + count - 1) % count];
                if let Some(exit) = prev.entry_speed_kmh() {
                    if d < SPEED_RAMP_M {
                        let t = d / SPEED_RAMP_M;
                        speed = speed.min(exit + (self.straight_speed_kmh - exit) * t);
                    }
                }
                speed
            }
        }
    }

    /// Integrate the curvature profile into a finely sampled east/north path.
    fn path(&self) -> Vec<(f64, f64)> {
        let total = self.length_m();
        let steps = (total / PATH_STEP_M).ceil() as usize + 1;
        let mut path = Vec::with_capacity(steps);
        let (mut x, mut y, mut heading) = (0.0_f64, 0.0_f64, 0.0_f64);
        path.push((x, y));
        for step in 1..steps {
            let s_mid = (step as f64 - 0.5) * PATH_STEP_M;
            heading += self.curvature_at(s_mid) * PATH_STEP_M;
            x += heading.cos() * PATH_STEP_M;
            y += heading.sin() * PATH_STEP_M;
            path.push((x, y));
        }
        path
    }

    fn position_at(path: &[(f64, f64)], s: f64) -> (f64, f64) {
        let pos = s / PATH_STEP_M;
        let idx = (pos.floor() as usize).min(path.len().saturating_sub(2));
        let t = (pos - idx as f64).clamp(0.0, 1.0);
        let (x0, y0) = path[idx];
        let (x1, y1) = path[idx + 1];
        (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t)
    }

    /// Records for one lap at 10 Hz. `pace` scales every speed of the lap.
    pub fn lap_records(&self, lap_number: u32, start_time_s: f64, pace: f64) -> Vec<TelemetryRecord> {
        let path = self.path();
        let total = self.length_m();
        let mut records = Vec::new();
        let mut s = 0.0;
        let mut timestamp_s = start_time_s;
        while s < total {
            let speed_kmh = self.speed_kmh_at(s) * pace;
            let (east, north) = Self::position_at(&path, s);
            let (lat, lon) = local_to_geodetic(east, north);
            records.push(TelemetryRecord {
                lap_number,
                timestamp_s,
                lat,
                lon,
                speed_kmh,
            });
            s += speed_kmh / 3.6 * SAMPLE_PERIOD_S;
            timestamp_s += SAMPLE_PERIOD_S;
        }
        records
    }

    /// Records for consecutive laps, one `(lap_number, pace)` pair per lap.
    pub fn session_records(&self, laps: &[(u32, f64)]) -> Vec<TelemetryRecord> {
        let mut records: Vec<TelemetryRecord> = Vec::new();
        for (lap_number, pace) in laps {
            let start = records
                .last()
                .map(|r| r.timestamp_s + SAMPLE_PERIOD_S)
                .unwrap_or(0.0);
            records.extend(self.lap_records(*lap_number, start, *pace));
        }
        records
    }
}

/// A lap driven along a straight line at constant speed.
pub fn straight_lap_records(
    lap_number: u32,
    start_time_s: f64,
    length_m: f64,
    speed_kmh: f64,
) -> Vec<TelemetryRecord> {
    let step = speed_kmh / 3.6 * SAMPLE_PERIOD_S;
    let count = (length_m / step).ceil() as usize;
    (0..count)
        .map(|i| {
            let (lat, lon) = local_to_geodetic(i as f64 * step, 0.0);
            TelemetryRecord {
                lap_number,
                timestamp_s: start_time_s + i as f64 * SAMPLE_PERIOD_S,
                lat,
                lon,
                speed_kmh,
            }
        })
        .collect()
}
