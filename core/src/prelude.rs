use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::geodesy;

/// Category of wireless emitter a detection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmitterType {
    #[serde(rename = "WIFI")]
    Wifi,
    #[serde(rename = "BT")]
    Bt,
    #[serde(rename = "BLE")]
    Ble,
    #[serde(rename = "CELL")]
    Cell,
}

impl EmitterType {
    pub const ALL: [EmitterType; 4] = [
        EmitterType::Wifi,
        EmitterType::Bt,
        EmitterType::Ble,
        EmitterType::Cell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmitterType::Wifi => "WIFI",
            EmitterType::Bt => "BT",
            EmitterType::Ble => "BLE",
            EmitterType::Cell => "CELL",
        }
    }
}

impl fmt::Display for EmitterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitterType {
    type Err = SightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "WIFI" => Ok(EmitterType::Wifi),
            "BT" => Ok(EmitterType::Bt),
            "BLE" => Ok(EmitterType::Ble),
            "CELL" => Ok(EmitterType::Cell),
            other => Err(SightError::MalformedRecord(format!(
                "unknown emitter type {:?}",
                other
            ))),
        }
    }
}

/// Identity of a physical emitter: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub emitter: EmitterType,
    pub id: String,
}

impl DeviceKey {
    pub fn new(emitter: EmitterType, id: impl Into<String>) -> Self {
        Self {
            emitter,
            id: id.into(),
        }
    }
}

/// Whitelist entries are stored as `TYPE|id`.
impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.emitter, self.id)
    }
}

impl FromStr for DeviceKey {
    type Err = SightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (emitter, id) = value
            .split_once('|')
            .ok_or_else(|| SightError::MalformedRecord(format!("device key {:?}", value)))?;
        Ok(DeviceKey::new(emitter.parse()?, id))
    }
}

/// A resolved position fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn distance_miles(&self, other: &Location) -> f64 {
        geodesy::haversine_distance_miles(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    pub fn distance_meters(&self, other: &Location) -> f64 {
        self.distance_miles(other) * geodesy::METERS_PER_MILE
    }

    pub fn grid_reference(&self) -> String {
        geodesy::to_grid_reference(self.latitude, self.longitude)
    }
}

/// One accepted, timestamped detection. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub timestamp: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "type")]
    pub emitter: EmitterType,
    pub name: String,
    pub id: String,
    pub rssi: i32,
}

impl Sighting {
    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.emitter, self.id.clone())
    }

    pub fn matches(&self, key: &DeviceKey) -> bool {
        self.emitter == key.emitter && self.id == key.id
    }

    /// Both coordinates must be present for a sighting to count as located.
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Location::new(lat, lon)),
            _ => None,
        }
    }
}

/// Raw detection handed to the ingestion engine by a scan collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "type")]
    pub emitter: EmitterType,
    pub name: String,
    pub id: String,
    pub rssi: i32,
    #[serde(default)]
    pub location: Option<Location>,
}

impl RawDetection {
    pub fn new(emitter: EmitterType, name: impl Into<String>, id: impl Into<String>, rssi: i32) -> Self {
        Self {
            emitter,
            name: name.into(),
            id: id.into(),
            rssi,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.emitter, self.id.clone())
    }
}

/// One counter per emitter type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub wifi: usize,
    pub bt: usize,
    pub ble: usize,
    pub cell: usize,
}

impl TypeCounts {
    pub fn increment(&mut self, emitter: EmitterType) {
        match emitter {
            EmitterType::Wifi => self.wifi += 1,
            EmitterType::Bt => self.bt += 1,
            EmitterType::Ble => self.ble += 1,
            EmitterType::Cell => self.cell += 1,
        }
    }

    pub fn get(&self, emitter: EmitterType) -> usize {
        match emitter {
            EmitterType::Wifi => self.wifi,
            EmitterType::Bt => self.bt,
            EmitterType::Ble => self.ble,
            EmitterType::Cell => self.cell,
        }
    }
}

/// Per-type accepted counts plus the current grid reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub wifi: usize,
    pub bt: usize,
    pub ble: usize,
    pub cell: usize,
    pub grid_reference: String,
}

impl StatusUpdate {
    pub fn new(counts: TypeCounts, grid_reference: impl Into<String>) -> Self {
        Self {
            wifi: counts.wifi,
            bt: counts.bt,
            ble: counts.ble,
            cell: counts.cell,
            grid_reference: grid_reference.into(),
        }
    }
}

/// Common error type for the sighting core.
#[derive(thiserror::Error, Debug)]
pub enum SightError {
    #[error("location unavailable")]
    LocationUnavailable,
    #[error("sink write failure on {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("settings failure: {0}")]
    Settings(String),
    #[error("scan orchestrator is no longer running")]
    Closed,
}

pub type SightResult<T> = Result<T, SightError>;

/// Time source for sighting timestamps.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// ISO-8601 instant with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds of an ISO-8601 timestamp; unparseable input maps to 0.
pub fn timestamp_millis(value: &str) -> i64 {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn device_key_round_trips_through_whitelist_form() {
        let key = DeviceKey::new(EmitterType::Cell, "lte:1|2");
        let text = key.to_string();
        assert_eq!(text, "CELL|lte:1|2");
        assert_eq!(text.parse::<DeviceKey>().unwrap(), key);
    }

    #[test]
    fn unknown_emitter_type_is_malformed() {
        assert!(matches!(
            "ZIGBEE".parse::<EmitterType>(),
            Err(SightError::MalformedRecord(_))
        ));
    }

    #[test]
    fn timestamps_render_with_millis_and_zulu() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let text = format_timestamp(ts);
        assert_eq!(text, "2024-05-01T12:00:00.000Z");
        assert_eq!(timestamp_millis(&text), ts.timestamp_millis());
        assert_eq!(timestamp_millis("not a time"), 0);
    }

    #[test]
    fn sighting_without_both_coordinates_is_unlocated() {
        let sighting = Sighting {
            timestamp: String::new(),
            latitude: Some(1.0),
            longitude: None,
            emitter: EmitterType::Ble,
            name: "tag".into(),
            id: "AA".into(),
            rssi: -70,
        };
        assert!(sighting.location().is_none());
    }
}
