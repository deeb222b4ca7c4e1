// Coaching advice generated from scored corners. Output is a pure function
// of the scored input.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::corners::Corner;
use crate::scoring::{ApexTiming, CornerMetrics, SessionScore};

/// Seconds per metre of braking-point error
const BRAKING_IMPACT_PER_M: f64 = 0.05;
const MIN_BRAKING_DELTA_M: f64 = 2.0;
/// Seconds per metre of apex error
const APEX_IMPACT_PER_M: f64 = 0.08;
const MIN_APEX_ERROR_M: f64 = 1.0;
const HARD_APEX_ERROR_M: f64 = 3.0;
/// Seconds per km/h of apex speed deficit
const SPEED_IMPACT_PER_KMH: f64 = 0.01;
const MIN_SPEED_DEFICIT_KMH: f64 = 3.0;
const HARD_SPEED_DEFICIT_KMH: f64 = 8.0;
const MIN_LINK_SPEED_LOSS_KMH: f64 = 5.0;
const LINK_IMPACT_PER_KMH: f64 = 0.01;
const DOUBLE_APEX_ENTRY_LOSS_KMH: f64 = 20.0;
const DOUBLE_APEX_EXIT_GAIN_KMH: f64 = 10.0;
const DOUBLE_APEX_IMPACT_PER_KMH: f64 = 0.005;
/// Corners at or above this score get no corner-level global advice
const GOOD_CORNER_SCORE: f64 = 80.0;
const MISSING_POINT_IMPACT: f64 = 0.003;
const MIN_CONSISTENCY_SCORE: f64 = 15.0;
const CONSISTENCY_IMPACT_PER_POINT: f64 = 0.02;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CoachingConfig {
    /// Longest advice list handed out
    pub max_items: usize,
}

impl Default for CoachingConfig {
    fn default() -> Self {
        Self { max_items: 5 }
    }
}

/// Declaration order is the tie-break order of the ranking
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceCategory {
    Braking,
    Apex,
    Speed,
    Trajectory,
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoachingAdvice {
    /// 1 for the most valuable advice
    pub priority: u32,
    pub category: AdviceCategory,
    pub corner_id: Option<u32>,
    /// Estimated lap time gain (s)
    pub impact_seconds: f64,
    pub message: String,
    pub explanation: String,
    pub difficulty: Difficulty,
}

impl CoachingAdvice {
    fn new(
        category: AdviceCategory,
        corner_id: Option<u32>,
        impact_seconds: f64,
        difficulty: Difficulty,
        message: String,
        explanation: String,
    ) -> Self {
        Self {
            priority: 0,
            category,
            corner_id,
            impact_seconds,
            message,
            explanation,
            difficulty,
        }
    }
}

pub struct CoachingGenerator {
    config: CoachingConfig,
}

impl CoachingGenerator {
    pub fn new(config: CoachingConfig) -> Self {
        Self { config }
    }

    /// Ranked advice for the scored corners, at most `max_items` long.
    pub fn generate(&self, corners: &[Corner], score: &SessionScore) -> Vec<CoachingAdvice> {
        let scored = corners
            .iter()
            .filter_map(|c| c.metrics.as_ref().map(|m| (c, m)))
            .collect::<Vec<_>>();

        let mut advice = Vec::new();
        for (corner, metrics) in &scored {
            advice.extend(braking_advice(corner, metrics));
            advice.extend(apex_advice(corner, metrics));
            advice.extend(speed_advice(corner, metrics));
        }
        advice.extend(trajectory_advice(&scored));
        advice.extend(global_advice(&scored, score));

        let time_lost = scored
            .iter()
            .map(|(c, m)| (c.corner_id, m.time_lost_s))
            .collect::<BTreeMap<_, _>>();
        let ranking_time = |item: &CoachingAdvice| {
            item.corner_id
                .and_then(|id| time_lost.get(&id).copied())
                .unwrap_or(item.impact_seconds)
        };

        let total = advice.len();
        let ranked = advice
            .into_iter()
            .sorted_by(|a, b| {
                ranking_time(b)
                    .total_cmp(&ranking_time(a))
                    .then(b.impact_seconds.total_cmp(&a.impact_seconds))
                    .then(a.category.cmp(&b.category))
                    .then(compare_corner_ids(a.corner_id, b.corner_id))
            })
            .take(self.config.max_items)
            .enumerate()
            .map(|(rank, mut item)| {
                item.priority = rank as u32 + 1;
                item
            })
            .collect::<Vec<_>>();
        debug!("Kept {} of {} advice items", ranked.len(), total);
        ranked
    }
}

/// Corner-level items before session-level items
fn compare_corner_ids(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn braking_advice(corner: &Corner, metrics: &CornerMetrics) -> Option<CoachingAdvice> {
    let delta = metrics.braking_delta_m;
    if delta.abs() < MIN_BRAKING_DELTA_M {
        return None;
    }
    let impact = delta.abs() * BRAKING_IMPACT_PER_M;
    let label = corner.label();
    let current = format!(
        "You brake {:.1} m before the apex where {:.1} m is enough.",
        metrics.braking_distance_m, metrics.optimal_braking_distance_m
    );
    let advice = if delta > 0.0 {
        CoachingAdvice::new(
            AdviceCategory::Braking,
            Some(corner.corner_id),
            impact,
            Difficulty::Easy,
            format!("{} - you brake {:.1} m too early", label, delta),
            format!(
                "{} Pick a marker {:.0} m closer to the apex to start braking and gain about {:.2} s per lap.",
                current, delta, impact
            ),
        )
    } else {
        CoachingAdvice::new(
            AdviceCategory::Braking,
            Some(corner.corner_id),
            impact,
            Difficulty::Medium,
            format!("{} - you brake {:.1} m too late", label, -delta),
            format!(
                "{} Arriving too fast forces a correction at the apex. Brake {:.1} m earlier to settle the kart; estimated loss {:.2} s per lap.",
                current, -delta, impact
            ),
        )
    };
    Some(advice)
}

fn apex_advice(corner: &Corner, metrics: &CornerMetrics) -> Option<CoachingAdvice> {
    let error = metrics.apex_distance_error_m;
    if error < MIN_APEX_ERROR_M {
        return None;
    }
    let impact = error * APEX_IMPACT_PER_M;
    let action = match metrics.apex_timing {
        ApexTiming::Early => "Your apex comes too early: wait a moment longer before turning in.",
        ApexTiming::Late => "Your apex comes too late: turn in earlier and clip the inside sooner.",
        ApexTiming::OnPoint => "Your apex is on time but off the ideal line: tighten toward the inside.",
    };
    let difficulty = if error < HARD_APEX_ERROR_M {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    };
    Some(CoachingAdvice::new(
        AdviceCategory::Apex,
        Some(corner.corner_id),
        impact,
        difficulty,
        format!("{} - apex {:.1} m off the ideal point", corner.label(), error),
        format!(
            "{} A precise apex lets you open the throttle earlier on exit. Estimated gain {:.2} s per lap.",
            action, impact
        ),
    ))
}

fn speed_advice(corner: &Corner, metrics: &CornerMetrics) -> Option<CoachingAdvice> {
    if metrics.optimal_apex_speed_kmh <= 0.0 {
        return None;
    }
    let deficit = metrics.optimal_apex_speed_kmh - metrics.apex_speed_kmh;
    if deficit < MIN_SPEED_DEFICIT_KMH {
        return None;
    }
    let impact = deficit * SPEED_IMPACT_PER_KMH;
    let difficulty = if deficit < HARD_SPEED_DEFICIT_KMH {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    };
    Some(CoachingAdvice::new(
        AdviceCategory::Speed,
        Some(corner.corner_id),
        impact,
        difficulty,
        format!(
            "{} - {:.1} km/h at the apex vs {:.1} km/h possible",
            corner.label(),
            metrics.apex_speed_kmh,
            metrics.optimal_apex_speed_kmh
        ),
        format!(
            "The grip available on this radius allows {:.1} km/h more at the apex ({:.0}% efficiency), worth about {:.2} s per lap. Work on smoother steering and trust the tyres progressively.",
            deficit,
            metrics.apex_speed_efficiency * 100.0,
            impact
        ),
    ))
}

fn trajectory_advice(scored: &[(&Corner, &CornerMetrics)]) -> Vec<CoachingAdvice> {
    let mut advice = Vec::new();
    for ((first, first_metrics), (second, second_metrics)) in scored.iter().tuple_windows() {
        let (Some(exit), Some(entry)) = (first_metrics.exit_speed_kmh, second_metrics.entry_speed_kmh)
        else {
            continue;
        };
        let loss = exit - entry;
        if loss <= MIN_LINK_SPEED_LOSS_KMH {
            continue;
        }
        let impact = loss * LINK_IMPACT_PER_KMH;
        advice.push(CoachingAdvice::new(
            AdviceCategory::Trajectory,
            None,
            impact,
            Difficulty::Medium,
            format!(
                "{} to {} - {:.1} km/h lost between the corners",
                first.label(),
                second.label(),
                loss
            ),
            format!(
                "You leave {} at {:.1} km/h but enter {} at {:.1} km/h. Use more track width on the exit of {} to carry the speed.",
                first.label(),
                exit,
                second.label(),
                entry,
                first.label()
            ),
        ));
    }

    for (corner, metrics) in scored {
        let (Some(entry), Some(exit)) = (metrics.entry_speed_kmh, metrics.exit_speed_kmh) else {
            continue;
        };
        let entry_loss = entry - metrics.apex_speed_kmh;
        let exit_gain = exit - metrics.apex_speed_kmh;
        if entry_loss > DOUBLE_APEX_ENTRY_LOSS_KMH && exit_gain > DOUBLE_APEX_EXIT_GAIN_KMH {
            advice.push(CoachingAdvice::new(
                AdviceCategory::Trajectory,
                Some(corner.corner_id),
                entry_loss * DOUBLE_APEX_IMPACT_PER_KMH,
                Difficulty::Hard,
                format!("{} - inefficient double-apex line", corner.label()),
                format!(
                    "You lose {:.1} km/h on entry and win back {:.1} km/h on exit. A single apex line would be faster.",
                    entry_loss, exit_gain
                ),
            ));
        }
    }
    advice
}

fn global_advice(scored: &[(&Corner, &CornerMetrics)], score: &SessionScore) -> Vec<CoachingAdvice> {
    let mut advice = scored
        .iter()
        .sorted_by(|(a, ma), (b, mb)| ma.score.total_cmp(&mb.score).then(a.corner_id.cmp(&b.corner_id)))
        .take(3)
        .filter(|(_, m)| m.score < GOOD_CORNER_SCORE)
        .map(|(corner, metrics)| weak_corner_advice(corner, metrics))
        .collect::<Vec<_>>();

    let consistency = score.breakdown.trajectory_consistency;
    if !scored.is_empty() && consistency < MIN_CONSISTENCY_SCORE {
        let impact = (MIN_CONSISTENCY_SCORE - consistency) * CONSISTENCY_IMPACT_PER_POINT;
        advice.push(CoachingAdvice::new(
            AdviceCategory::Global,
            None,
            impact,
            Difficulty::Medium,
            format!("Consistency - {:.1}/20 across laps", consistency),
            format!(
                "Apex speeds vary a lot from lap to lap. Look far ahead toward the corner exit and keep your hands smooth on the wheel. Estimated gain {:.2} s per lap.",
                impact
            ),
        ));
    }

    let best = score
        .details
        .best_corners
        .iter()
        .filter_map(|id| scored.iter().find(|(c, _)| c.corner_id == *id))
        .take(3)
        .collect::<Vec<_>>();
    if !best.is_empty() {
        let labels = best.iter().map(|(c, _)| c.label()).join(", ");
        let mean_apex = best.iter().map(|(_, m)| m.apex_speed_kmh).sum::<f64>() / best.len() as f64;
        advice.push(CoachingAdvice::new(
            AdviceCategory::Global,
            None,
            0.0,
            Difficulty::Easy,
            format!("Strengths: {} - average apex speed {:.0} km/h", labels, mean_apex),
            format!(
                "Your best corners ({}) are your reference. Notice what you do differently there (eyes, braking timing, progressive release) and repeat it in similar corners.",
                labels
            ),
        ));
    }
    advice
}

fn weak_corner_advice(corner: &Corner, metrics: &CornerMetrics) -> CoachingAdvice {
    let impact = (100.0 - metrics.score) * MISSING_POINT_IMPACT;
    let label = corner.label();
    let deficit = (metrics.optimal_apex_speed_kmh - metrics.apex_speed_kmh).max(0.0);
    if deficit > 5.0 {
        CoachingAdvice::new(
            AdviceCategory::Global,
            Some(corner.corner_id),
            impact,
            Difficulty::Medium,
            format!(
                "{} - {:.1} km/h short at the apex ({:.0} vs {:.0} km/h)",
                label, deficit, metrics.apex_speed_kmh, metrics.optimal_apex_speed_kmh
            ),
            format!(
                "You reach the apex of this {} corner too slowly. Brake a little later and release the brake progressively toward the apex. Peak lateral load is {:.1} g, so the grip is there. Estimated gain {:.2} s per lap.",
                corner.direction, metrics.max_lateral_g, impact
            ),
        )
    } else if metrics.apex_distance_error_m > 2.0 {
        let action = match metrics.apex_timing {
            ApexTiming::Late => "clip the inside earlier",
            _ => "be patient before turning in",
        };
        CoachingAdvice::new(
            AdviceCategory::Global,
            Some(corner.corner_id),
            impact,
            Difficulty::Medium,
            format!(
                "{} - apex {:.1} m off, line needs work",
                label, metrics.apex_distance_error_m
            ),
            format!(
                "Your line through this corner is not optimal: {}. Fix your eyes on a point on the inside before turning the wheel. Estimated gain {:.2} s per lap.",
                action, impact
            ),
        )
    } else {
        CoachingAdvice::new(
            AdviceCategory::Global,
            Some(corner.corner_id),
            impact,
            Difficulty::Easy,
            format!("{} - score {:.0}/100, irregular from lap to lap", label, metrics.score),
            format!(
                "This corner changes from lap to lap. Choose one fixed braking marker and use it every lap; apex speed is {:.0} km/h today. Consistency before speed.",
                metrics.apex_speed_kmh
            ),
        )
    }
}
