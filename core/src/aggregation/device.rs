use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::prelude::{timestamp_millis, DeviceKey, Location, Sighting};

/// Running per-device summary derived from sightings.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAggregate {
    pub key: DeviceKey,
    pub name: String,
    pub rssi: i32,
    pub count: usize,
    pub last_seen: Option<i64>,
    pub last_seen_text: String,
    /// Largest distance between any two located sightings of this device.
    pub max_distance_miles: f64,
    #[serde(skip)]
    points: Vec<Location>,
}

impl DeviceAggregate {
    pub fn new(key: DeviceKey) -> Self {
        Self {
            key,
            name: "Unknown".into(),
            rssi: 0,
            count: 0,
            last_seen: None,
            last_seen_text: String::new(),
            max_distance_miles: 0.0,
            points: Vec::new(),
        }
    }

    /// Compares the new point against every earlier point, so the maximum
    /// covers non-adjacent extremes too.
    pub fn add_point(&mut self, location: Location) {
        for previous in &self.points {
            let distance = previous.distance_miles(&location);
            if distance > self.max_distance_miles {
                self.max_distance_miles = distance;
            }
        }
        self.points.push(location);
    }

    pub fn observe(&mut self, sighting: &Sighting) {
        self.count += 1;
        let ts = timestamp_millis(&sighting.timestamp);
        if self.last_seen.map_or(true, |seen| ts >= seen) {
            self.last_seen = Some(ts);
            self.last_seen_text = sighting.timestamp.clone();
            self.name = sighting.name.clone();
            self.rssi = sighting.rssi;
        }
        if let Some(location) = sighting.location() {
            self.add_point(location);
        }
    }

    pub fn points(&self) -> &[Location] {
        &self.points
    }
}

/// Aggregates keyed by device, iterated in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AggregateSet {
    order: Vec<DeviceKey>,
    devices: HashMap<DeviceKey, DeviceAggregate>,
}

impl AggregateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sightings(sightings: &[Sighting]) -> Self {
        let mut set = Self::new();
        for sighting in sightings {
            set.observe(sighting);
        }
        set
    }

    pub fn observe(&mut self, sighting: &Sighting) {
        let key = sighting.key();
        if !self.devices.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.devices
            .entry(key.clone())
            .or_insert_with(|| DeviceAggregate::new(key))
            .observe(sighting);
    }

    pub fn get(&self, key: &DeviceKey) -> Option<&DeviceAggregate> {
        self.devices.get(key)
    }

    pub fn remove(&mut self, key: &DeviceKey) -> Option<DeviceAggregate> {
        self.order.retain(|k| k != key);
        self.devices.remove(key)
    }

    /// Drops every device whose `TYPE|id` form is in `whitelist`.
    pub fn exclude(&mut self, whitelist: &BTreeSet<String>) {
        let listed: Vec<DeviceKey> = self
            .order
            .iter()
            .filter(|key| whitelist.contains(&key.to_string()))
            .cloned()
            .collect();
        for key in listed {
            self.remove(&key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceAggregate> {
        self.order.iter().filter_map(|key| self.devices.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::EmitterType;

    fn sighting(ts: &str, name: &str, rssi: i32, at: Option<(f64, f64)>) -> Sighting {
        Sighting {
            timestamp: ts.into(),
            latitude: at.map(|p| p.0),
            longitude: at.map(|p| p.1),
            emitter: EmitterType::Ble,
            name: name.into(),
            id: "C0:FF:EE".into(),
            rssi,
        }
    }

    #[test]
    fn max_distance_is_all_pairs_not_consecutive() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(0.0, 3.0);
        let c = Location::new(0.0, 1.0);
        let mut agg = DeviceAggregate::new(DeviceKey::new(EmitterType::Wifi, "x"));
        agg.add_point(a);
        agg.add_point(b);
        agg.add_point(c);

        let expected = a
            .distance_miles(&b)
            .max(a.distance_miles(&c))
            .max(b.distance_miles(&c));
        assert!((agg.max_distance_miles - expected).abs() < 1e-9);
        assert!((agg.max_distance_miles - a.distance_miles(&c)).abs() > 1.0);
        assert!(agg.max_distance_miles < a.distance_miles(&b) + b.distance_miles(&c));
    }

    #[test]
    fn max_distance_never_decreases() {
        let mut agg = DeviceAggregate::new(DeviceKey::new(EmitterType::Wifi, "x"));
        let mut previous = 0.0;
        for (i, lat) in [0.0, 1.0, 0.5, 0.2, 0.9].iter().enumerate() {
            agg.add_point(Location::new(*lat, i as f64 * 0.01));
            assert!(agg.max_distance_miles >= previous);
            previous = agg.max_distance_miles;
        }
    }

    #[test]
    fn latest_timestamp_wins_and_ties_go_to_later_row() {
        let rows = vec![
            sighting("2024-05-01T12:00:05.000Z", "second", -40, None),
            sighting("2024-05-01T12:00:01.000Z", "first", -80, Some((1.0, 1.0))),
            sighting("2024-05-01T12:00:05.000Z", "tie", -45, Some((1.0, 1.1))),
        ];
        let set = AggregateSet::from_sightings(&rows);
        let agg = set.get(&rows[0].key()).unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.name, "tie");
        assert_eq!(agg.rssi, -45);
        assert_eq!(agg.last_seen_text, "2024-05-01T12:00:05.000Z");
        assert_eq!(agg.points().len(), 2);
    }

    #[test]
    fn iteration_follows_first_seen_order_and_exclusion() {
        let mut rows = Vec::new();
        for id in ["b", "a", "c", "a"] {
            let mut s = sighting("2024-05-01T12:00:00.000Z", id, -50, None);
            s.id = id.into();
            rows.push(s);
        }
        let mut set = AggregateSet::from_sightings(&rows);
        let ids: Vec<_> = set.iter().map(|a| a.key.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);

        let whitelist: BTreeSet<String> = ["BLE|a".to_string()].into_iter().collect();
        set.exclude(&whitelist);
        assert_eq!(set.len(), 2);
        assert!(set.get(&DeviceKey::new(EmitterType::Ble, "a")).is_none());
    }
}
