use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::prelude::{DeviceKey, Location};

/// Per-device deduplication state for the active run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DedupState {
    /// Location of the last accepted located sighting. `None` only while the
    /// device has been seen exclusively without a fix.
    pub baseline: Option<Location>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Record the sighting. `moved_miles` is the distance from a known
    /// baseline to a known current fix, when both exist.
    Accept { moved_miles: Option<f64> },
    /// Within the suppression radius of the baseline; nothing changes.
    Suppress { distance_m: f64 },
}

/// The read-modify-write core of ingestion, keyed by device.
#[derive(Debug, Default)]
pub struct DedupTable {
    states: HashMap<DeviceKey, DedupState>,
    suppress_radius_m: f64,
}

impl DedupTable {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            states: HashMap::new(),
            suppress_radius_m: config.suppress_radius_m,
        }
    }

    /// Decides and commits in one step. Accepted sightings bump the count and
    /// move the baseline when `current` is known; an unlocated sighting keeps
    /// whatever baseline was already established.
    pub fn evaluate(&mut self, key: &DeviceKey, current: Option<Location>, dwell: bool) -> Decision {
        let state = self.states.entry(key.clone()).or_default();
        let moved_miles = match (state.baseline, current) {
            (Some(baseline), Some(here)) => Some(baseline.distance_miles(&here)),
            _ => None,
        };

        if !dwell {
            if let Some(miles) = moved_miles {
                let distance_m = miles * crate::geodesy::METERS_PER_MILE;
                if distance_m < self.suppress_radius_m {
                    return Decision::Suppress { distance_m };
                }
            }
        }

        state.count += 1;
        if current.is_some() {
            state.baseline = current;
        }
        Decision::Accept { moved_miles }
    }

    pub fn get(&self, key: &DeviceKey) -> Option<&DedupState> {
        self.states.get(key)
    }

    pub fn forget(&mut self, key: &DeviceKey) {
        self.states.remove(key);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::EmitterType;

    fn table() -> DedupTable {
        DedupTable::new(&EngineConfig::default())
    }

    fn key() -> DeviceKey {
        DeviceKey::new(EmitterType::Wifi, "AA:BB")
    }

    #[test]
    fn suppression_measures_from_original_baseline() {
        let mut table = table();
        let origin = Location::new(0.0, 0.0);
        assert!(matches!(
            table.evaluate(&key(), Some(origin), false),
            Decision::Accept { moved_miles: None }
        ));

        // ~50 m away: suppressed and the baseline stays at the origin.
        let near = Location::new(0.0, 0.00045);
        match table.evaluate(&key(), Some(near), false) {
            Decision::Suppress { distance_m } => assert!((distance_m - 50.0).abs() < 1.0),
            other => panic!("expected suppression, got {:?}", other),
        }
        assert_eq!(table.get(&key()).unwrap().baseline, Some(origin));

        // ~150 m from the origin, ~100 m from the suppressed point.
        let far = Location::new(0.0, 0.00135);
        assert!(matches!(
            table.evaluate(&key(), Some(far), false),
            Decision::Accept { moved_miles: Some(_) }
        ));
        let state = table.get(&key()).unwrap();
        assert_eq!(state.count, 2);
        assert_eq!(state.baseline, Some(far));
    }

    #[test]
    fn unlocated_sighting_keeps_baseline() {
        let mut table = table();
        let origin = Location::new(10.0, 10.0);
        table.evaluate(&key(), Some(origin), false);
        assert!(matches!(
            table.evaluate(&key(), None, false),
            Decision::Accept { moved_miles: None }
        ));
        assert_eq!(table.get(&key()).unwrap().baseline, Some(origin));
        assert!(matches!(
            table.evaluate(&key(), Some(origin), false),
            Decision::Suppress { .. }
        ));
    }

    #[test]
    fn unset_baseline_heals_without_suppressing() {
        let mut table = table();
        table.evaluate(&key(), None, false);
        assert_eq!(table.get(&key()).unwrap().baseline, None);

        let here = Location::new(1.0, 1.0);
        assert!(matches!(
            table.evaluate(&key(), Some(here), false),
            Decision::Accept { moved_miles: None }
        ));
        assert_eq!(table.get(&key()).unwrap().baseline, Some(here));
    }

    #[test]
    fn dwell_accepts_everything_but_still_measures() {
        let mut table = table();
        let here = Location::new(1.0, 1.0);
        table.evaluate(&key(), Some(here), true);
        match table.evaluate(&key(), Some(here), true) {
            Decision::Accept { moved_miles } => assert_eq!(moved_miles, Some(0.0)),
            other => panic!("expected accept, got {:?}", other),
        }
        assert_eq!(table.get(&key()).unwrap().count, 2);
    }
}
