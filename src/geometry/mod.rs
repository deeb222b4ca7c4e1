// Trajectory geometry of a single lap: distance, heading, curvature and
// lateral acceleration derived from GPS position and speed.

mod smoothing;

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};
use uom::si::f64::Velocity;
use uom::si::velocity::{kilometer_per_hour, meter_per_second};

use crate::telemetry::Sample;
use smoothing::{centered_moving_average, rolling_median};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const GRAVITY_MPS2: f64 = 9.81;

/// Segments shorter than this keep the previous heading
const MIN_HEADING_SEGMENT_M: f64 = 0.1;
const HEADING_MEDIAN_WINDOW: usize = 5;
const CURVATURE_SMOOTHING_WINDOW: usize = 11;
/// Below this speed GPS heading is mostly noise
const MIN_CURVATURE_SPEED_KMH: f64 = 5.0;
const MIN_CURVATURE_DISTANCE_M: f64 = 0.1;
/// Curvatures below this (1/m) are treated as straight
pub const MIN_CURVATURE: f64 = 1e-4;
const MAX_LATERAL_G: f64 = 3.0;

pub fn kmh_to_mps(speed_kmh: f64) -> f64 {
    Velocity::new::<kilometer_per_hour>(speed_kmh).get::<meter_per_second>()
}

pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    Velocity::new::<meter_per_second>(speed_mps).get::<kilometer_per_hour>()
}

/// Great-circle distance in metres between two points in decimal degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

pub fn sample_distance(a: &Sample, b: &Sample) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon)
}

/// Bearing from `a` to `b` in radians, counter-clockwise from east, using a
/// local equirectangular projection.
fn planar_bearing(a: &Sample, b: &Sample) -> f64 {
    let mean_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let dnorth = (b.lat - a.lat).to_radians() * EARTH_RADIUS_M;
    let deast = (b.lon - a.lon).to_radians() * EARTH_RADIUS_M * mean_lat.cos();
    dnorth.atan2(deast)
}

/// Signed lateral acceleration in g for a speed and a signed curvature.
pub fn lateral_g(speed_kmh: f64, curvature: f64) -> f64 {
    if speed_kmh < MIN_CURVATURE_SPEED_KMH || curvature.abs() < MIN_CURVATURE {
        return 0.0;
    }
    let v = kmh_to_mps(speed_kmh);
    (v * v * curvature.abs() / GRAVITY_MPS2).min(MAX_LATERAL_G) * curvature.signum()
}

/// Per-sample geometry of one lap. All vectors have the lap's sample count.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LapGeometry {
    /// Running arc length from the first sample of the lap (m)
    pub cumulative_distance: Vec<f64>,
    /// Unwrapped heading (rad, counter-clockwise from east)
    pub heading: Vec<f64>,
    /// Smoothed signed curvature (1/m, positive turning left)
    pub curvature: Vec<f64>,
    /// Signed lateral acceleration (g, positive turning left)
    pub lateral_g: Vec<f64>,
}

impl LapGeometry {
    /// Geometry that only carries a distance coordinate, with every other
    /// signal flat.
    pub fn from_cumulative_distance(cumulative_distance: Vec<f64>) -> Self {
        let len = cumulative_distance.len();
        Self {
            cumulative_distance,
            heading: vec![0.0; len],
            curvature: vec![0.0; len],
            lateral_g: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.cumulative_distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative_distance.is_empty()
    }

    pub fn total_distance(&self) -> f64 {
        self.cumulative_distance.last().copied().unwrap_or(0.0)
    }

    /// Distance covered between two samples of the lap
    pub fn distance_between(&self, from: usize, to: usize) -> f64 {
        match (self.cumulative_distance.get(from), self.cumulative_distance.get(to)) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }
}

/// Compute the geometry of one lap from its ordered samples.
pub fn analyze_lap(samples: &[Sample]) -> LapGeometry {
    let n = samples.len();
    if n == 0 {
        return LapGeometry::default();
    }

    let mut segment = vec![0.0; n];
    for i in 1..n {
        segment[i] = sample_distance(&samples[i - 1], &samples[i]);
    }
    let cumulative_distance = segment
        .iter()
        .scan(0.0, |total, d| {
            *total += d;
            Some(*total)
        })
        .collect::<Vec<_>>();

    let heading = rolling_median(&unwrapped_headings(samples, &segment), HEADING_MEDIAN_WINDOW);

    let mut raw_curvature = vec![0.0; n];
    for i in 1..n.saturating_sub(1) {
        if samples[i].speed_kmh < MIN_CURVATURE_SPEED_KMH {
            continue;
        }
        let span = segment[i] + segment[i + 1];
        if span < MIN_CURVATURE_DISTANCE_M {
            continue;
        }
        let k = (heading[i + 1] - heading[i - 1]) / span;
        if k.abs() >= MIN_CURVATURE {
            raw_curvature[i] = k;
        }
    }
    let curvature = centered_moving_average::<CURVATURE_SMOOTHING_WINDOW>(&raw_curvature);

    let lateral_g = curvature
        .iter()
        .zip(samples)
        .map(|(k, sample)| lateral_g(sample.speed_kmh, *k))
        .collect();

    LapGeometry {
        cumulative_distance,
        heading,
        curvature,
        lateral_g,
    }
}

fn unwrapped_headings(samples: &[Sample], segment: &[f64]) -> Vec<f64> {
    let raw = (0..samples.len())
        .map(|i| {
            (i > 0 && segment[i] >= MIN_HEADING_SEGMENT_M)
                .then(|| planar_bearing(&samples[i - 1], &samples[i]))
        })
        .collect::<Vec<_>>();

    let Some(first) = raw.iter().flatten().next().copied() else {
        return vec![0.0; samples.len()];
    };

    let mut previous_raw = first;
    let mut unwrapped = first;
    raw.into_iter()
        .map(|bearing| {
            if let Some(bearing) = bearing {
                let delta = (bearing - previous_raw + PI).rem_euclid(TAU) - PI;
                unwrapped += delta;
                previous_raw = bearing;
            }
            unwrapped
        })
        .collect()
}
