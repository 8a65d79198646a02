//! Consumer-facing device list: per-device rows filtered by emitter type and
//! RSSI band, with the most recent fix for grid-reference display.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::prelude::{
    timestamp_millis, DeviceKey, EmitterType, Location, SightResult, Sighting, TypeCounts,
};
use crate::settings::Preferences;
use crate::store::read_sightings;

/// The live list only considers the most recent rows of a log.
pub const LIVE_ROW_LIMIT: usize = 5000;

/// Inclusive RSSI window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiBand {
    pub min: i32,
    pub max: i32,
}

impl RssiBand {
    /// Combines the persisted bounds with an optional, stricter ad hoc minimum.
    pub fn effective(persisted_min: i32, persisted_max: i32, ad_hoc_min: Option<i32>) -> Self {
        let min = match ad_hoc_min {
            Some(ad_hoc) => persisted_min.max(ad_hoc),
            None => persisted_min,
        };
        Self {
            min,
            max: persisted_max,
        }
    }

    pub fn contains(&self, rssi: i32) -> bool {
        rssi >= self.min && rssi <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFilter {
    pub shown: BTreeSet<EmitterType>,
    pub rssi: RssiBand,
}

impl LiveFilter {
    pub fn all(rssi: RssiBand) -> Self {
        Self {
            shown: EmitterType::ALL.into_iter().collect(),
            rssi,
        }
    }

    pub fn hide(mut self, emitter: EmitterType) -> Self {
        self.shown.remove(&emitter);
        self
    }

    pub fn includes(&self, sighting: &Sighting) -> bool {
        self.rssi.contains(sighting.rssi) && self.shown.contains(&sighting.emitter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Rssi,
    LastSeen,
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRow {
    pub key: DeviceKey,
    pub name: String,
    pub rssi: i32,
    pub count: usize,
    pub first_seen_text: String,
    pub last_seen: i64,
    pub last_seen_text: String,
    pub last_location: Option<Location>,
    #[serde(skip)]
    last_located_at: i64,
}

impl DeviceRow {
    fn first(sighting: &Sighting, ts: i64) -> Self {
        Self {
            key: sighting.key(),
            name: sighting.name.clone(),
            rssi: sighting.rssi,
            count: 1,
            first_seen_text: sighting.timestamp.clone(),
            last_seen: ts,
            last_seen_text: sighting.timestamp.clone(),
            last_location: sighting.location(),
            last_located_at: ts,
        }
    }

    fn update(&mut self, sighting: &Sighting, ts: i64) {
        self.count += 1;
        if ts >= self.last_seen {
            self.last_seen = ts;
            self.last_seen_text = sighting.timestamp.clone();
            self.name = sighting.name.clone();
            self.rssi = sighting.rssi;
        }
        if let Some(location) = sighting.location() {
            if self.last_location.is_none() || ts >= self.last_located_at {
                self.last_location = Some(location);
                self.last_located_at = ts;
            }
        }
    }

    pub fn grid_reference(&self) -> Option<String> {
        self.last_location.map(|loc| loc.grid_reference())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveView {
    pub rows: Vec<DeviceRow>,
    /// Unique devices per type after filtering.
    pub unique: TypeCounts,
    /// Most recent located sighting in the log, before any filtering.
    pub latest_fix: Option<Location>,
}

impl LiveView {
    pub fn build(
        sightings: &[Sighting],
        filter: &LiveFilter,
        whitelist: &BTreeSet<String>,
        sort: SortOrder,
    ) -> Self {
        let mut latest: Option<(i64, Location)> = None;
        let mut order: Vec<DeviceKey> = Vec::new();
        let mut rows: HashMap<DeviceKey, DeviceRow> = HashMap::new();

        for sighting in sightings {
            let ts = timestamp_millis(&sighting.timestamp);
            if let Some(location) = sighting.location() {
                if latest.map_or(true, |(seen, _)| ts >= seen) {
                    latest = Some((ts, location));
                }
            }
            if !filter.includes(sighting) {
                continue;
            }
            let key = sighting.key();
            if whitelist.contains(&key.to_string()) {
                continue;
            }
            match rows.get_mut(&key) {
                Some(row) => row.update(sighting, ts),
                None => {
                    rows.insert(key.clone(), DeviceRow::first(sighting, ts));
                    order.push(key);
                }
            }
        }

        let mut rows: Vec<DeviceRow> = order
            .into_iter()
            .filter_map(|key| rows.remove(&key))
            .collect();
        match sort {
            SortOrder::Rssi => rows.sort_by(|a, b| b.rssi.cmp(&a.rssi)),
            SortOrder::LastSeen => rows.sort_by(|a, b| b.last_seen.cmp(&a.last_seen)),
            SortOrder::Count => rows.sort_by(|a, b| b.count.cmp(&a.count)),
        }

        let mut unique = TypeCounts::default();
        for row in &rows {
            unique.increment(row.key.emitter);
        }

        Self {
            rows,
            unique,
            latest_fix: latest.map(|(_, location)| location),
        }
    }

    /// Builds the view from the most recent rows of a CSV log, applying the
    /// persisted RSSI bounds, any ad hoc minimum and the whitelist.
    pub fn load(
        csv_path: &Path,
        preferences: &dyn Preferences,
        hidden: &[EmitterType],
        ad_hoc_min: Option<i32>,
        sort: SortOrder,
    ) -> SightResult<Self> {
        let sightings = read_sightings(csv_path, Some(LIVE_ROW_LIMIT))?;
        let (min, max) = preferences.rssi_bounds();
        let filter = hidden
            .iter()
            .fold(LiveFilter::all(RssiBand::effective(min, max, ad_hoc_min)), |f, t| {
                f.hide(*t)
            });
        Ok(Self::build(&sightings, &filter, &preferences.whitelist(), sort))
    }

    pub fn latest_grid_reference(&self) -> Option<String> {
        self.latest_fix.map(|loc| loc.grid_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use crate::store::write_csv;
    use tempfile::tempdir;

    fn s(sec: u32, emitter: EmitterType, id: &str, rssi: i32, at: Option<(f64, f64)>) -> Sighting {
        Sighting {
            timestamp: format!("2024-05-01T12:00:{:02}.000Z", sec),
            latitude: at.map(|p| p.0),
            longitude: at.map(|p| p.1),
            emitter,
            name: format!("{}-{}", id, sec),
            id: id.into(),
            rssi,
        }
    }

    #[test]
    fn effective_band_takes_stricter_minimum() {
        assert_eq!(RssiBand::effective(-150, 0, None), RssiBand { min: -150, max: 0 });
        assert_eq!(RssiBand::effective(-90, -10, Some(-70)).min, -70);
        assert_eq!(RssiBand::effective(-60, -10, Some(-70)).min, -60);
        let band = RssiBand::effective(-80, -20, None);
        assert!(band.contains(-80) && band.contains(-20));
        assert!(!band.contains(-81) && !band.contains(-19));
    }

    #[test]
    fn rows_track_latest_located_coordinate() {
        let rows = vec![
            s(0, EmitterType::Wifi, "AA", -60, Some((40.0, -74.0))),
            s(1, EmitterType::Wifi, "AA", -50, Some((40.1, -74.0))),
            s(2, EmitterType::Wifi, "AA", -55, None),
        ];
        let view = LiveView::build(
            &rows,
            &LiveFilter::all(RssiBand::effective(-150, 0, None)),
            &BTreeSet::new(),
            SortOrder::Count,
        );
        let row = &view.rows[0];
        assert_eq!(row.count, 3);
        assert_eq!(row.rssi, -55);
        assert_eq!(row.first_seen_text, "2024-05-01T12:00:00.000Z");
        assert_eq!(row.last_location, Some(Location::new(40.1, -74.0)));
        assert!(row.grid_reference().unwrap().starts_with("18T "));
        assert_eq!(view.latest_fix, Some(Location::new(40.1, -74.0)));
    }

    #[test]
    fn filters_by_type_band_and_whitelist() {
        let rows = vec![
            s(0, EmitterType::Wifi, "AA", -60, None),
            s(1, EmitterType::Bt, "BB", -60, None),
            s(2, EmitterType::Ble, "CC", -95, Some((1.0, 1.0))),
            s(3, EmitterType::Cell, "DD", -60, None),
            s(4, EmitterType::Wifi, "EE", -40, None),
        ];
        let filter = LiveFilter::all(RssiBand::effective(-150, 0, Some(-90))).hide(EmitterType::Bt);
        let whitelist: BTreeSet<String> = ["CELL|DD".to_string()].into_iter().collect();
        let view = LiveView::build(&rows, &filter, &whitelist, SortOrder::Rssi);

        let ids: Vec<_> = view.rows.iter().map(|r| r.key.id.as_str()).collect();
        assert_eq!(ids, ["EE", "AA"]);
        assert_eq!(view.unique.wifi, 2);
        assert_eq!(view.unique.get(EmitterType::Ble), 0);
        // The filtered-out BLE row still supplies the latest fix.
        assert_eq!(view.latest_fix, Some(Location::new(1.0, 1.0)));
    }

    #[test]
    fn load_applies_persisted_preferences() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        write_csv(
            &path,
            &[
                s(0, EmitterType::Wifi, "AA", -60, None),
                s(1, EmitterType::Wifi, "BB", -100, None),
                s(2, EmitterType::Wifi, "CC", -70, None),
            ],
        )
        .unwrap();
        let prefs = SettingsStore::in_memory();
        prefs.set_rssi_bounds(-90, 0).unwrap();
        prefs
            .set_whitelisted(&DeviceKey::new(EmitterType::Wifi, "CC"), true)
            .unwrap();

        let view = LiveView::load(&path, &prefs, &[], None, SortOrder::LastSeen).unwrap();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].key.id, "AA");
    }
}
