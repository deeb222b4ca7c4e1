use std::collections::BTreeMap;

use super::{DiscardedCandidate, LapDetection};
use crate::ApexError;
use crate::telemetry::LapLayout;

/// Final corner id of every kept per-lap candidate, keyed by
/// `(lap_number, provisional_id)`. Built once after ordering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CornerIdMap {
    ids: BTreeMap<(u32, u32), u32>,
}

impl CornerIdMap {
    pub(super) fn insert(&mut self, lap_number: u32, provisional_id: u32, corner_id: u32) {
        self.ids.insert((lap_number, provisional_id), corner_id);
    }

    pub fn get(&self, lap_number: u32, provisional_id: u32) -> Option<u32> {
        self.ids.get(&(lap_number, provisional_id)).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `((lap_number, provisional_id), corner_id)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32), u32)> + '_ {
        self.ids.iter().map(|(key, id)| (*key, *id))
    }
}

/// Corner id of every sample of the selected laps, `None` outside corners.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CornerAssignments {
    layout: LapLayout,
    per_lap: BTreeMap<u32, Vec<Option<u32>>>,
}

impl CornerAssignments {
    /// Resolve every candidate through `id_map`. A candidate that is neither
    /// mapped nor discarded means renumbering is incomplete.
    pub(super) fn build(
        detections: &[LapDetection],
        id_map: &CornerIdMap,
        discarded: &[DiscardedCandidate],
        layout: &LapLayout,
    ) -> Result<Self, ApexError> {
        let mut per_lap: BTreeMap<u32, Vec<Option<u32>>> = layout
            .spans()
            .iter()
            .map(|span| (span.lap_number, vec![None; span.len]))
            .collect();

        for detection in detections {
            for candidate in &detection.candidates {
                let Some(corner_id) = id_map.get(candidate.lap_number, candidate.provisional_id)
                else {
                    let was_discarded = discarded.iter().any(|d| {
                        d.candidate.lap_number == candidate.lap_number
                            && d.candidate.provisional_id == candidate.provisional_id
                    });
                    if was_discarded {
                        continue;
                    }
                    return Err(ApexError::MissingRenumbering {
                        lap_number: candidate.lap_number,
                        provisional_id: candidate.provisional_id,
                    });
                };

                if let Some(lap) = per_lap.get_mut(&candidate.lap_number) {
                    let end = (candidate.exit_local_index + 1).min(lap.len());
                    let start = candidate.entry_local_index.min(end);
                    lap[start..end].iter_mut().for_each(|slot| *slot = Some(corner_id));
                }
            }
        }

        Ok(Self {
            layout: layout.clone(),
            per_lap,
        })
    }

    pub fn corner_at(&self, lap_number: u32, lap_local_index: usize) -> Option<u32> {
        self.per_lap
            .get(&lap_number)
            .and_then(|lap| lap.get(lap_local_index))
            .copied()
            .flatten()
    }

    pub fn corner_at_global(&self, global_index: usize) -> Option<u32> {
        let (lap_number, lap_local_index) = self.layout.locate(global_index)?;
        self.corner_at(lap_number, lap_local_index)
    }

    pub fn lap(&self, lap_number: u32) -> Option<&[Option<u32>]> {
        self.per_lap.get(&lap_number).map(Vec::as_slice)
    }

    /// Corner ids that at least one sample points to
    pub fn referenced_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.per_lap.values().flatten().flatten().copied()
    }
}
