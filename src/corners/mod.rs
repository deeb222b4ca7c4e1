// Corner detection per lap and reconciliation across laps.

mod assignments;
mod detector;
mod reconciler;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ApexError;
use crate::scoring::CornerMetrics;

pub use assignments::{CornerAssignments, CornerIdMap};
pub use detector::{CornerDetector, DetectionConfig, LapDetection};
pub use reconciler::{
    DiscardReason, DiscardedCandidate, ReconcileConfig, Reconciler, Reconciliation,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Left for positive values (counter-clockwise), right otherwise
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// A corner seen on one lap, before cross-lap matching. Indices are local to
/// the lap and `provisional_id` is only unique within that lap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerCandidate {
    pub lap_number: u32,
    pub provisional_id: u32,
    pub entry_local_index: usize,
    pub apex_local_index: usize,
    pub exit_local_index: usize,
    pub direction: Direction,
}

impl CornerCandidate {
    /// Whether both candidates cover at least one common sample of the same lap
    pub fn overlaps(&self, other: &CornerCandidate) -> bool {
        self.lap_number == other.lap_number
            && self.entry_local_index <= other.exit_local_index
            && other.entry_local_index <= self.exit_local_index
    }

    pub fn lap_data(&self) -> CornerLapData {
        CornerLapData {
            entry_local_index: self.entry_local_index,
            apex_local_index: self.apex_local_index,
            exit_local_index: self.exit_local_index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerLapData {
    pub entry_local_index: usize,
    pub apex_local_index: usize,
    pub exit_local_index: usize,
}

impl CornerLapData {
    pub fn overlaps(&self, other: &CornerLapData) -> bool {
        self.entry_local_index <= other.exit_local_index
            && other.entry_local_index <= self.exit_local_index
    }
}

/// A physical corner of the track, numbered in track order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub corner_id: u32,
    pub direction: Direction,
    /// Lap number to the corner's sample indices on that lap
    pub per_lap_data: BTreeMap<u32, CornerLapData>,
    /// Apex global index on the reference lap, else on the first lap with data
    pub apex_global_index: Option<usize>,
    /// Mean apex distance from the start of the lap over all laps with data
    pub avg_cumulative_distance: Option<f64>,
    pub metrics: Option<CornerMetrics>,
}

impl Corner {
    /// Short label used in reports and coaching messages
    pub fn label(&self) -> String {
        format!("V{}", self.corner_id)
    }

    pub fn laps(&self) -> impl Iterator<Item = u32> + '_ {
        self.per_lap_data.keys().copied()
    }
}

/// Check the invariants of a canonical corner list: ids are `1..=N` in list
/// order, every corner has data on at least one lap and no two corners share
/// an apex sample.
pub fn validate_corners(corners: &[Corner]) -> Result<(), ApexError> {
    let mut apexes = HashSet::new();
    for (position, corner) in corners.iter().enumerate() {
        let expected = position as u32 + 1;
        if corner.corner_id != expected {
            return Err(ApexError::CornerInvariantViolation {
                reason: format!(
                    "corner at position {} has id {}, expected {}",
                    position, corner.corner_id, expected
                ),
            });
        }
        if corner.per_lap_data.is_empty() {
            return Err(ApexError::CornerInvariantViolation {
                reason: format!("corner {} has no per-lap data", corner.corner_id),
            });
        }
        for (lap_number, data) in &corner.per_lap_data {
            if !apexes.insert((*lap_number, data.apex_local_index)) {
                return Err(ApexError::CornerInvariantViolation {
                    reason: format!(
                        "apex {} on lap {} belongs to more than one corner",
                        data.apex_local_index, lap_number
                    ),
                });
            }
        }
    }
    Ok(())
}
