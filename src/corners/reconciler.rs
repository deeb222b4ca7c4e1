use std::cmp::Ordering;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{
    Corner, CornerAssignments, CornerCandidate, CornerIdMap, CornerLapData, Direction,
    LapDetection, validate_corners,
};
use crate::ApexError;
use crate::telemetry::LapLayout;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Matching window as a fraction of the median lap length
    pub distance_tolerance_fraction: f64,
    /// Lower bound of the matching window (m)
    pub min_distance_tolerance_m: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            distance_tolerance_fraction: 0.02,
            min_distance_tolerance_m: 10.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Overlapped another candidate of the same lap in the same group
    SameLapDuplicate,
    /// Belonged to a group that overlapped another group on a shared lap
    OverlappingGroup,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscardedCandidate {
    pub candidate: CornerCandidate,
    pub reason: DiscardReason,
}

/// The canonical corner list and everything derived from its numbering.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub corners: Vec<Corner>,
    pub id_map: CornerIdMap,
    pub assignments: CornerAssignments,
    pub discarded: Vec<DiscardedCandidate>,
    pub reference_lap: Option<u32>,
    pub distance_tolerance_m: f64,
}

/// A candidate with the distance of its apex from the start of its lap
struct Located<'a> {
    candidate: &'a CornerCandidate,
    apex_distance: f64,
}

/// Candidates believed to be the same physical corner, at most one per lap
struct CornerGroup<'a> {
    direction: Direction,
    members: Vec<Located<'a>>,
}

impl<'a> CornerGroup<'a> {
    fn new(first: Located<'a>) -> Self {
        Self {
            direction: first.candidate.direction,
            members: vec![first],
        }
    }

    fn mean_distance(&self) -> f64 {
        self.members.iter().map(|m| m.apex_distance).sum::<f64>() / self.members.len() as f64
    }

    fn accepts(&self, item: &Located<'a>, tolerance: f64) -> bool {
        self.direction == item.candidate.direction
            && (item.apex_distance - self.mean_distance()).abs() <= tolerance
    }

    fn member_on_lap(&self, lap_number: u32) -> Option<&'a CornerCandidate> {
        self.members
            .iter()
            .map(|m| m.candidate)
            .find(|c| c.lap_number == lap_number)
    }

    /// First lap on which a member of each group covers a common sample
    fn overlapping_lap(&self, other: &CornerGroup<'a>) -> Option<u32> {
        self.members.iter().find_map(|a| {
            other
                .member_on_lap(a.candidate.lap_number)
                .filter(|b| a.candidate.overlaps(b))
                .map(|_| a.candidate.lap_number)
        })
    }

    fn lap_data(&self) -> BTreeMap<u32, CornerLapData> {
        self.members
            .iter()
            .map(|m| (m.candidate.lap_number, m.candidate.lap_data()))
            .collect()
    }
}

/// Keys deciding where a group lands in track order.
#[derive(Clone, Debug)]
struct OrderKeys {
    reference_apex: Option<usize>,
    avg_distance: Option<f64>,
    global_apex: Option<usize>,
    min_entry: usize,
}

impl OrderKeys {
    /// Track distance when both sides have it, then global apex index, then
    /// the lowest entry index.
    fn fallback_cmp(&self, other: &OrderKeys) -> Ordering {
        let by_distance = match (self.avg_distance, other.avg_distance) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => Ordering::Equal,
        };
        let by_global = match (self.global_apex, other.global_apex) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        };
        by_distance
            .then(by_global)
            .then(self.min_entry.cmp(&other.min_entry))
    }
}

pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Matching window (m): a fraction of the median lap length, bounded below.
    pub fn distance_tolerance(&self, detections: &[LapDetection]) -> f64 {
        let lengths = detections
            .iter()
            .filter(|d| !d.geometry.is_empty())
            .map(|d| d.geometry.total_distance())
            .sorted_by(f64::total_cmp)
            .collect::<Vec<_>>();
        let median = match lengths.len() {
            0 => 0.0,
            n if n % 2 == 1 => lengths[n / 2],
            n => (lengths[n / 2 - 1] + lengths[n / 2]) / 2.0,
        };
        (self.config.distance_tolerance_fraction * median).max(self.config.min_distance_tolerance_m)
    }

    /// Merge the per-lap candidates of all selected laps into one numbered
    /// corner list. Either the whole list is produced or an internal error is
    /// returned.
    pub fn reconcile(
        &self,
        detections: &[LapDetection],
        layout: &LapLayout,
    ) -> Result<Reconciliation, ApexError> {
        let reference_lap = layout.reference_lap();
        let distance_tolerance_m = self.distance_tolerance(detections);
        let mut discarded = Vec::new();

        let located = locate_candidates(detections)?;
        let candidate_count = located.len();
        let groups = group_candidates(located, distance_tolerance_m, &mut discarded);
        let groups = dedupe_groups(groups, reference_lap, &mut discarded);
        let ordered = order_groups(groups, reference_lap, layout)?;

        let mut id_map = CornerIdMap::default();
        let mut corners = Vec::with_capacity(ordered.len());
        for (position, (group, keys)) in ordered.into_iter().enumerate() {
            let corner_id = position as u32 + 1;
            for member in &group.members {
                id_map.insert(
                    member.candidate.lap_number,
                    member.candidate.provisional_id,
                    corner_id,
                );
            }
            corners.push(Corner {
                corner_id,
                direction: group.direction,
                per_lap_data: group.lap_data(),
                apex_global_index: keys.global_apex,
                avg_cumulative_distance: keys.avg_distance,
                metrics: None,
            });
        }

        let assignments = CornerAssignments::build(detections, &id_map, &discarded, layout)?;
        validate_corners(&corners)?;

        info!(
            "Reconciled {} candidates from {} laps into {} corners ({} discarded, tolerance {:.1} m)",
            candidate_count,
            detections.len(),
            corners.len(),
            discarded.len(),
            distance_tolerance_m
        );
        Ok(Reconciliation {
            corners,
            id_map,
            assignments,
            discarded,
            reference_lap,
            distance_tolerance_m,
        })
    }
}

fn locate_candidates(detections: &[LapDetection]) -> Result<Vec<Located<'_>>, ApexError> {
    let mut located = Vec::new();
    for detection in detections {
        for candidate in &detection.candidates {
            let apex_distance = detection
                .geometry
                .cumulative_distance
                .get(candidate.apex_local_index)
                .copied()
                .ok_or_else(|| ApexError::CornerInvariantViolation {
                    reason: format!(
                        "apex {} of candidate {} is outside lap {}",
                        candidate.apex_local_index, candidate.provisional_id, candidate.lap_number
                    ),
                })?;
            located.push(Located {
                candidate,
                apex_distance,
            });
        }
    }
    located.sort_by(|a, b| {
        a.apex_distance
            .total_cmp(&b.apex_distance)
            .then(a.candidate.lap_number.cmp(&b.candidate.lap_number))
            .then(a.candidate.apex_local_index.cmp(&b.candidate.apex_local_index))
    });
    Ok(located)
}

/// Sweep candidates in apex-distance order. A candidate joins the group with
/// the nearest mean among those within tolerance that have no member from its
/// lap; an overlapping member from its own lap makes it a duplicate instead.
fn group_candidates<'a>(
    located: Vec<Located<'a>>,
    tolerance: f64,
    discarded: &mut Vec<DiscardedCandidate>,
) -> Vec<CornerGroup<'a>> {
    let mut groups: Vec<CornerGroup<'a>> = Vec::new();
    for item in located {
        let lap_number = item.candidate.lap_number;
        let duplicate_of = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.accepts(&item, tolerance))
            .find_map(|(index, group)| {
                group
                    .members
                    .iter()
                    .position(|m| m.candidate.overlaps(item.candidate))
                    .map(|position| (index, position))
            });

        if let Some((index, position)) = duplicate_of {
            let group = &mut groups[index];
            let existing = group.members[position].candidate;
            let dropped = if item.candidate.entry_local_index < existing.entry_local_index {
                std::mem::replace(&mut group.members[position], item).candidate
            } else {
                item.candidate
            };
            warn!(
                "Duplicate detection on lap {}: candidate {} overlaps another candidate of the same corner, discarding it",
                dropped.lap_number, dropped.provisional_id
            );
            discarded.push(DiscardedCandidate {
                candidate: dropped.clone(),
                reason: DiscardReason::SameLapDuplicate,
            });
            continue;
        }

        let nearest = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| {
                group.accepts(&item, tolerance) && group.member_on_lap(lap_number).is_none()
            })
            .min_by(|(_, a), (_, b)| {
                (a.mean_distance() - item.apex_distance)
                    .abs()
                    .total_cmp(&(b.mean_distance() - item.apex_distance).abs())
            })
            .map(|(index, _)| index);
        match nearest {
            Some(index) => groups[index].members.push(item),
            None => groups.push(CornerGroup::new(item)),
        }
    }
    groups
}

/// Drop groups that alias the same samples as another group on a shared lap.
fn dedupe_groups<'a>(
    groups: Vec<CornerGroup<'a>>,
    reference_lap: Option<u32>,
    discarded: &mut Vec<DiscardedCandidate>,
) -> Vec<CornerGroup<'a>> {
    let mut removed = vec![false; groups.len()];
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if removed[i] || removed[j] {
                continue;
            }
            let Some(shared_lap) = groups[i].overlapping_lap(&groups[j]) else {
                continue;
            };
            let loser = if keeps_first(&groups[i], &groups[j], shared_lap, reference_lap) {
                j
            } else {
                i
            };
            removed[loser] = true;
            warn!(
                "Corner group at {:.1} m overlaps another group on lap {}, discarding it",
                groups[loser].mean_distance(),
                shared_lap
            );
        }
    }

    groups
        .into_iter()
        .zip(removed)
        .filter_map(|(group, removed)| {
            if !removed {
                return Some(group);
            }
            discarded.extend(group.members.iter().map(|m| DiscardedCandidate {
                candidate: m.candidate.clone(),
                reason: DiscardReason::OverlappingGroup,
            }));
            None
        })
        .collect()
}

/// Whether `a` survives a conflict with `b`: the lower entry index on the
/// reference lap wins, a group with reference data beats one without, and
/// otherwise the lower entry index on the shared lap wins.
fn keeps_first(
    a: &CornerGroup<'_>,
    b: &CornerGroup<'_>,
    shared_lap: u32,
    reference_lap: Option<u32>,
) -> bool {
    let entry_on = |group: &CornerGroup<'_>, lap_number: u32| {
        group
            .member_on_lap(lap_number)
            .map(|c| c.entry_local_index)
    };
    match reference_lap.map(|lap| (entry_on(a, lap), entry_on(b, lap))) {
        Some((Some(entry_a), Some(entry_b))) => entry_a <= entry_b,
        Some((Some(_), None)) => true,
        Some((None, Some(_))) => false,
        _ => entry_on(a, shared_lap) <= entry_on(b, shared_lap),
    }
}

fn order_keys(
    index: usize,
    group: &CornerGroup<'_>,
    reference_lap: Option<u32>,
    layout: &LapLayout,
) -> Result<OrderKeys, ApexError> {
    let min_entry = group
        .members
        .iter()
        .map(|m| m.candidate.entry_local_index)
        .min()
        .ok_or(ApexError::EmptyCornerGroup { group: index })?;

    let reference = reference_lap.and_then(|lap| group.member_on_lap(lap));
    let anchor = reference.or_else(|| {
        group
            .members
            .iter()
            .map(|m| m.candidate)
            .min_by_key(|c| c.lap_number)
    });

    Ok(OrderKeys {
        reference_apex: reference.map(|c| c.apex_local_index),
        avg_distance: Some(group.mean_distance()),
        global_apex: anchor.and_then(|c| layout.global_index(c.lap_number, c.apex_local_index)),
        min_entry,
    })
}

/// Order groups by reference-lap apex index. Groups without reference data
/// are slotted in front of the first reference group that lies after them.
fn order_groups<'a>(
    groups: Vec<CornerGroup<'a>>,
    reference_lap: Option<u32>,
    layout: &LapLayout,
) -> Result<Vec<(CornerGroup<'a>, OrderKeys)>, ApexError> {
    let mut with_reference = Vec::new();
    let mut without_reference = Vec::new();
    for (index, group) in groups.into_iter().enumerate() {
        let keys = order_keys(index, &group, reference_lap, layout)?;
        if keys.reference_apex.is_some() {
            with_reference.push((group, keys));
        } else {
            without_reference.push((group, keys));
        }
    }

    let with_reference = with_reference
        .into_iter()
        .sorted_by(|(_, a), (_, b)| {
            a.reference_apex
                .cmp(&b.reference_apex)
                .then_with(|| a.fallback_cmp(b))
        })
        .collect::<Vec<_>>();

    let mut slots: Vec<Vec<(CornerGroup<'a>, OrderKeys)>> =
        (0..=with_reference.len()).map(|_| Vec::new()).collect();
    for (group, keys) in without_reference {
        let slot = with_reference
            .iter()
            .position(|(_, reference)| keys.fallback_cmp(reference) == Ordering::Less)
            .unwrap_or(with_reference.len());
        warn!(
            "Corner at {:.1} m has no data on reference lap {:?}, placing it by track distance",
            group.mean_distance(),
            reference_lap
        );
        slots[slot].push((group, keys));
    }

    let mut ordered = Vec::new();
    let mut references = with_reference.into_iter();
    for slot in slots {
        ordered.extend(slot.into_iter().sorted_by(|(_, a), (_, b)| a.fallback_cmp(b)));
        if let Some(reference) = references.next() {
            ordered.push(reference);
        }
    }
    debug!("Ordered {} corner groups", ordered.len());
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LapGeometry;

    const SAMPLE_SPACING_M: f64 = 2.0;

    fn detection(lap_number: u32, len: usize, apexes: &[usize]) -> LapDetection {
        let candidates = apexes
            .iter()
            .enumerate()
            .map(|(position, apex)| CornerCandidate {
                lap_number,
                provisional_id: position as u32 + 1,
                entry_local_index: apex - 5,
                apex_local_index: *apex,
                exit_local_index: apex + 5,
                direction: Direction::Left,
            })
            .collect();
        LapDetection {
            lap_number,
            geometry: LapGeometry::from_cumulative_distance(
                (0..len).map(|i| i as f64 * SAMPLE_SPACING_M).collect(),
            ),
            candidates,
        }
    }

    fn layout(detections: &[LapDetection]) -> LapLayout {
        LapLayout::from_lengths(
            &detections
                .iter()
                .map(|d| (d.lap_number, d.geometry.len()))
                .collect::<Vec<_>>(),
        )
    }

    fn reconcile(detections: &[LapDetection]) -> Reconciliation {
        Reconciler::new(ReconcileConfig::default())
            .reconcile(detections, &layout(detections))
            .unwrap()
    }

    const REFERENCE_APEXES: [usize; 9] = [29, 99, 158, 216, 269, 401, 425, 478, 500];

    fn scenario_a() -> Vec<LapDetection> {
        let lap8 = [30, 100, 159, 217, 270, 320, 350, 402, 426, 479, 501];
        vec![
            detection(4, 600, &REFERENCE_APEXES),
            detection(8, 600, &lap8),
        ]
    }

    #[test]
    fn test_tolerance_follows_median_lap_length() {
        let reconciler = Reconciler::new(ReconcileConfig::default());
        let detections = vec![
            detection(1, 600, &[]),
            detection(2, 1000, &[]),
            detection(3, 100, &[]),
        ];
        assert!((reconciler.distance_tolerance(&detections) - 23.96).abs() < 1e-9);
        assert_eq!(reconciler.distance_tolerance(&[detection(1, 100, &[])]), 10.0);
        assert_eq!(reconciler.distance_tolerance(&[]), 10.0);
    }

    #[test]
    fn test_reference_less_corners_are_slotted_by_distance() {
        let result = reconcile(&scenario_a());

        assert_eq!(result.corners.len(), 11);
        let ids = result.corners.iter().map(|c| c.corner_id).collect::<Vec<_>>();
        assert_eq!(ids, (1..=11).collect::<Vec<_>>());

        for corner in &result.corners[5..7] {
            assert_eq!(corner.laps().collect::<Vec<_>>(), vec![8]);
        }
        assert_eq!(result.corners[5].per_lap_data[&8].apex_local_index, 320);
        assert_eq!(result.corners[6].per_lap_data[&8].apex_local_index, 350);
        assert_eq!(result.corners[5].apex_global_index, Some(920));

        let reference_apexes = result
            .corners
            .iter()
            .filter_map(|c| c.per_lap_data.get(&4).map(|d| d.apex_local_index))
            .collect::<Vec<_>>();
        assert_eq!(reference_apexes, REFERENCE_APEXES.to_vec());
        assert_eq!(result.reference_lap, Some(4));
    }

    #[test]
    fn test_renumbering_reaches_every_sample() {
        let result = reconcile(&scenario_a());

        assert_eq!(result.id_map.get(8, 6), Some(6));
        assert_eq!(result.id_map.get(8, 8), Some(8));
        assert_eq!(result.id_map.get(4, 6), Some(8));
        assert_eq!(result.id_map.len(), 20);

        assert_eq!(result.assignments.corner_at(4, 401), Some(8));
        assert_eq!(result.assignments.corner_at(4, 300), None);
        assert_eq!(result.assignments.corner_at(8, 320), Some(6));
        assert_eq!(result.assignments.corner_at_global(600 + 350), Some(7));
        assert!(
            result
                .assignments
                .referenced_ids()
                .all(|id| id >= 1 && id as usize <= result.corners.len())
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let detections = scenario_a();
        assert_eq!(reconcile(&detections), reconcile(&detections));
    }

    #[test]
    fn test_same_lap_duplicates_collapse() {
        let mut lap = detection(1, 400, &[55, 200]);
        lap.candidates.insert(
            1,
            CornerCandidate {
                lap_number: 1,
                provisional_id: 2,
                entry_local_index: 51,
                apex_local_index: 57,
                exit_local_index: 62,
                direction: Direction::Left,
            },
        );
        lap.candidates[2].provisional_id = 3;

        let result = reconcile(&[lap]);
        assert_eq!(result.corners.len(), 2);
        assert_eq!(result.corners[0].per_lap_data[&1].apex_local_index, 55);
        assert_eq!(result.discarded.len(), 1);
        assert_eq!(result.discarded[0].candidate.provisional_id, 2);
        assert_eq!(result.discarded[0].reason, DiscardReason::SameLapDuplicate);
        assert_eq!(result.id_map.get(1, 2), None);
        assert_eq!(result.id_map.get(1, 3), Some(2));
        assert_eq!(result.assignments.corner_at(1, 61), None);
    }

    #[test]
    fn test_overlapping_groups_keep_lower_reference_entry() {
        let mut lap = detection(1, 400, &[]);
        lap.candidates = vec![
            CornerCandidate {
                lap_number: 1,
                provisional_id: 1,
                entry_local_index: 10,
                apex_local_index: 12,
                exit_local_index: 60,
                direction: Direction::Left,
            },
            CornerCandidate {
                lap_number: 1,
                provisional_id: 2,
                entry_local_index: 40,
                apex_local_index: 58,
                exit_local_index: 70,
                direction: Direction::Left,
            },
        ];

        let result = reconcile(&[lap]);
        assert_eq!(result.corners.len(), 1);
        assert_eq!(result.corners[0].per_lap_data[&1].entry_local_index, 10);
        assert_eq!(result.discarded[0].reason, DiscardReason::OverlappingGroup);
        assert_eq!(result.discarded[0].candidate.provisional_id, 2);
    }

    #[test]
    fn test_overlapping_group_with_reference_data_wins() {
        let lap1 = detection(1, 400, &[100]);
        let mut lap2 = detection(2, 400, &[]);
        lap2.candidates = vec![
            CornerCandidate {
                lap_number: 2,
                provisional_id: 1,
                entry_local_index: 95,
                apex_local_index: 100,
                exit_local_index: 130,
                direction: Direction::Left,
            },
            CornerCandidate {
                lap_number: 2,
                provisional_id: 2,
                entry_local_index: 120,
                apex_local_index: 125,
                exit_local_index: 130,
                direction: Direction::Left,
            },
        ];

        let result = reconcile(&[lap1, lap2]);
        assert_eq!(result.corners.len(), 1);
        assert_eq!(result.corners[0].laps().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(result.discarded.len(), 1);
        assert_eq!(result.discarded[0].candidate.apex_local_index, 125);
    }

    fn candidate(
        lap_number: u32,
        provisional_id: u32,
        (entry, apex, exit): (usize, usize, usize),
        direction: Direction,
    ) -> CornerCandidate {
        CornerCandidate {
            lap_number,
            provisional_id,
            entry_local_index: entry,
            apex_local_index: apex,
            exit_local_index: exit,
            direction,
        }
    }

    #[test]
    fn test_chicane_sightings_join_their_own_corner() {
        // Left at 100 m then right at 102 m on lap 1, both 4 m later on lap 2
        let mut lap1 = detection(1, 400, &[]);
        lap1.candidates = vec![
            candidate(1, 1, (46, 50, 50), Direction::Left),
            candidate(1, 2, (51, 51, 56), Direction::Right),
        ];
        let mut lap2 = detection(2, 400, &[]);
        lap2.candidates = vec![
            candidate(2, 1, (48, 52, 52), Direction::Left),
            candidate(2, 2, (53, 53, 58), Direction::Right),
        ];

        let result = reconcile(&[lap1, lap2]);
        assert_eq!(result.corners.len(), 2);
        assert!(result.discarded.is_empty());
        assert_eq!(result.corners[0].direction, Direction::Left);
        assert_eq!(result.corners[1].direction, Direction::Right);
        for corner in &result.corners {
            assert_eq!(corner.laps().collect::<Vec<_>>(), vec![1, 2]);
        }
        assert_eq!(result.id_map.get(2, 1), Some(1));
        assert_eq!(result.id_map.get(2, 2), Some(2));
    }

    #[test]
    fn test_same_lap_neighbour_does_not_split_earlier_corner() {
        // Lap 1 sees two separate left kinks 6 m apart; lap 2 sees only the first
        let mut lap1 = detection(1, 400, &[]);
        lap1.candidates = vec![
            candidate(1, 1, (45, 50, 51), Direction::Left),
            candidate(1, 2, (52, 53, 58), Direction::Left),
        ];
        let mut lap2 = detection(2, 400, &[]);
        lap2.candidates = vec![candidate(2, 1, (47, 51, 52), Direction::Left)];

        let result = reconcile(&[lap1, lap2]);
        assert_eq!(result.corners.len(), 2);
        assert_eq!(result.corners[0].laps().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(result.corners[0].per_lap_data[&2].apex_local_index, 51);
        assert_eq!(result.corners[1].laps().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_opposite_directions_are_not_matched() {
        let lap1 = detection(1, 400, &[100]);
        let mut lap2 = detection(2, 400, &[101]);
        lap2.candidates[0].direction = Direction::Right;

        let result = reconcile(&[lap1, lap2]);
        // Same samples on different laps, so both survive as separate corners
        assert_eq!(result.corners.len(), 2);
    }

    #[test]
    fn test_reference_less_corner_before_first_reference_corner() {
        let result = reconcile(&[detection(1, 400, &[100, 300]), detection(2, 400, &[30, 101, 301])]);
        assert_eq!(result.corners.len(), 3);
        assert_eq!(result.corners[0].laps().collect::<Vec<_>>(), vec![2]);
        assert_eq!(result.corners[1].per_lap_data[&1].apex_local_index, 100);
        assert!((result.corners[1].avg_cumulative_distance.unwrap() - 201.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_candidates_gives_empty_list() {
        let result = reconcile(&[detection(1, 400, &[]), detection(2, 400, &[])]);
        assert!(result.corners.is_empty());
        assert!(result.id_map.is_empty());
    }

    #[test]
    fn test_apex_outside_geometry_is_an_internal_error() {
        let mut lap = detection(1, 100, &[50]);
        lap.geometry = LapGeometry::from_cumulative_distance(vec![0.0; 10]);
        let layout = layout(&[detection(1, 100, &[])]);
        let err = Reconciler::new(ReconcileConfig::default())
            .reconcile(&[lap], &layout)
            .unwrap_err();
        assert!(err.is_internal());
    }
}
