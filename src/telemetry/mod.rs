pub mod loader;
pub mod synthetic;

use std::collections::BTreeMap;

pub use loader::load_telemetry_jsonl;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// One row of the uniform per-sample table handed over by the loader.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub lap_number: u32,
    /// Seconds since the start of the recording
    pub timestamp_s: f64,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Ground speed in km/h
    pub speed_kmh: f64,
}

/// A telemetry sample belonging to a selected lap.
///
/// `global_index` is the position of the sample in the concatenation of all
/// selected laps, in lap order then in-lap order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub global_index: usize,
    pub lap_number: u32,
    pub lap_local_index: usize,
    pub timestamp_s: f64,
    pub lat: f64,
    pub lon: f64,
    pub speed_kmh: f64,
}

#[derive(Clone, Debug, Default)]
pub struct Lap {
    pub lap_number: u32,
    pub records: Vec<TelemetryRecord>,
    pub lap_time_s: f64,
    pub is_selected: bool,
}

impl Lap {
    fn new(lap_number: u32, records: Vec<TelemetryRecord>) -> Self {
        let lap_time_s = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (last.timestamp_s - first.timestamp_s).max(0.0),
            _ => 0.0,
        };
        Self {
            lap_number,
            records,
            lap_time_s,
            is_selected: false,
        }
    }
}

/// Rules deciding which laps take part in the analysis.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LapSelection {
    /// Keep only laps at or under this lap time (seconds)
    pub max_lap_time_s: Option<f64>,
    /// Keep only these lap numbers
    pub laps: Option<Vec<u32>>,
    /// Lap 0 is the out lap on most loggers
    pub include_out_lap: bool,
}

impl LapSelection {
    fn accepts(&self, lap: &Lap) -> bool {
        if lap.records.len() < 2 {
            return false;
        }
        if lap.lap_number == 0 && !self.include_out_lap {
            return false;
        }
        if let Some(max_lap_time_s) = self.max_lap_time_s {
            if lap.lap_time_s > max_lap_time_s {
                return false;
            }
        }
        if let Some(laps) = &self.laps {
            return laps.contains(&lap.lap_number);
        }
        true
    }
}

/// All laps of a recorded session, in lap order.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub laps: Vec<Lap>,
}

impl Session {
    /// Group loader records into laps. Records keep their file order inside a
    /// lap; laps are ordered by lap number.
    pub fn from_records(records: Vec<TelemetryRecord>) -> Self {
        let mut by_lap: BTreeMap<u32, Vec<TelemetryRecord>> = BTreeMap::new();
        for record in records {
            by_lap.entry(record.lap_number).or_default().push(record);
        }
        Self {
            laps: by_lap
                .into_iter()
                .map(|(lap_number, records)| Lap::new(lap_number, records))
                .collect(),
        }
    }

    /// Mark laps as selected and build the concatenated view over them.
    pub fn select(&mut self, selection: &LapSelection) -> SelectedLaps {
        let mut selected = Vec::new();
        let mut global_offset = 0;
        for lap in self.laps.iter_mut() {
            lap.is_selected = selection.accepts(lap);
            if !lap.is_selected {
                debug!(
                    "Lap {} not selected ({} samples, {:.2}s)",
                    lap.lap_number,
                    lap.records.len(),
                    lap.lap_time_s
                );
                continue;
            }
            let samples = lap
                .records
                .iter()
                .enumerate()
                .map(|(lap_local_index, record)| Sample {
                    global_index: global_offset + lap_local_index,
                    lap_number: lap.lap_number,
                    lap_local_index,
                    timestamp_s: record.timestamp_s,
                    lat: record.lat,
                    lon: record.lon,
                    speed_kmh: record.speed_kmh,
                })
                .collect::<Vec<_>>();
            global_offset += samples.len();
            selected.push(SelectedLap {
                lap_number: lap.lap_number,
                lap_time_s: lap.lap_time_s,
                samples,
            });
        }
        info!(
            "Selected {} of {} laps ({} samples)",
            selected.len(),
            self.laps.len(),
            global_offset
        );
        SelectedLaps { laps: selected }
    }
}

#[derive(Clone, Debug)]
pub struct SelectedLap {
    pub lap_number: u32,
    pub lap_time_s: f64,
    pub samples: Vec<Sample>,
}

/// The laps taking part in an analysis, concatenated in lap order.
#[derive(Clone, Debug, Default)]
pub struct SelectedLaps {
    laps: Vec<SelectedLap>,
}

impl SelectedLaps {
    pub fn laps(&self) -> &[SelectedLap] {
        &self.laps
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn lap(&self, lap_number: u32) -> Option<&SelectedLap> {
        self.laps.iter().find(|l| l.lap_number == lap_number)
    }

    /// The numerically first selected lap
    pub fn reference_lap(&self) -> Option<u32> {
        self.laps.iter().map(|l| l.lap_number).min()
    }

    pub fn sample_count(&self) -> usize {
        self.laps.iter().map(|l| l.samples.len()).sum()
    }

    pub fn layout(&self) -> LapLayout {
        LapLayout::from_lengths(
            &self
                .laps
                .iter()
                .map(|l| (l.lap_number, l.samples.len()))
                .collect::<Vec<_>>(),
        )
    }
}

/// Span of one lap inside the global concatenation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LapSpan {
    pub lap_number: u32,
    pub global_offset: usize,
    pub len: usize,
}

/// Maps lap-local sample indices to global indices and back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LapLayout {
    spans: Vec<LapSpan>,
}

impl LapLayout {
    /// Build a layout from `(lap_number, sample_count)` pairs. Laps are laid
    /// out in lap-number order whatever the input order.
    pub fn from_lengths(lengths: &[(u32, usize)]) -> Self {
        let mut sorted = lengths.to_vec();
        sorted.sort_by_key(|(lap_number, _)| *lap_number);
        let mut global_offset = 0;
        let spans = sorted
            .into_iter()
            .map(|(lap_number, len)| {
                let span = LapSpan {
                    lap_number,
                    global_offset,
                    len,
                };
                global_offset += len;
                span
            })
            .collect();
        Self { spans }
    }

    pub fn spans(&self) -> &[LapSpan] {
        &self.spans
    }

    pub fn reference_lap(&self) -> Option<u32> {
        self.spans.first().map(|s| s.lap_number)
    }

    pub fn global_index(&self, lap_number: u32, lap_local_index: usize) -> Option<usize> {
        self.spans
            .iter()
            .find(|s| s.lap_number == lap_number)
            .filter(|s| lap_local_index < s.len)
            .map(|s| s.global_offset + lap_local_index)
    }

    /// Resolve a global index back to `(lap_number, lap_local_index)`
    pub fn locate(&self, global_index: usize) -> Option<(u32, usize)> {
        self.spans
            .iter()
            .find(|s| global_index >= s.global_offset && global_index < s.global_offset + s.len)
            .map(|s| (s.lap_number, global_index - s.global_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lap_number: u32, timestamp_s: f64) -> TelemetryRecord {
        TelemetryRecord {
            lap_number,
            timestamp_s,
            lat: 45.0,
            lon: 7.0,
            speed_kmh: 50.0,
        }
    }

    fn session() -> Session {
        let mut records = Vec::new();
        for lap in 0..4u32 {
            let lap_time = if lap == 2 { 60.0 } else { 45.0 };
            for i in 0..10 {
                records.push(record(lap, lap as f64 * 100.0 + i as f64 * lap_time / 9.0));
            }
        }
        Session::from_records(records)
    }

    #[test]
    fn test_session_groups_records_by_lap() {
        let session = session();
        assert_eq!(session.laps.len(), 4);
        assert!((session.laps[1].lap_time_s - 45.0).abs() < 1e-9);
        assert!((session.laps[2].lap_time_s - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_selection_by_lap_time_skips_out_lap() {
        let mut session = session();
        let selected = session.select(&LapSelection {
            max_lap_time_s: Some(50.0),
            ..LapSelection::default()
        });

        let laps = selected.laps().iter().map(|l| l.lap_number).collect::<Vec<_>>();
        assert_eq!(laps, vec![1, 3]);
        assert_eq!(selected.reference_lap(), Some(1));
        assert!(!session.laps[0].is_selected);
        assert!(!session.laps[2].is_selected);
    }

    #[test]
    fn test_global_index_is_concatenation_of_selected_laps() {
        let mut session = session();
        let selected = session.select(&LapSelection {
            laps: Some(vec![3, 1]),
            ..LapSelection::default()
        });

        let lap3 = selected.lap(3).unwrap();
        assert_eq!(lap3.samples[0].global_index, 10);
        assert_eq!(lap3.samples[9].global_index, 19);

        let layout = selected.layout();
        assert_eq!(layout.global_index(3, 2), Some(12));
        assert_eq!(layout.global_index(3, 10), None);
        assert_eq!(layout.locate(12), Some((3, 2)));
        assert_eq!(layout.locate(20), None);
    }

    #[test]
    fn test_layout_orders_laps_by_number() {
        let layout = LapLayout::from_lengths(&[(8, 100), (4, 50)]);
        assert_eq!(layout.reference_lap(), Some(4));
        assert_eq!(layout.global_index(8, 0), Some(50));
    }
}
