use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Thresholds and output location for the ingestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Re-sightings closer than this to the device baseline are suppressed.
    pub suppress_radius_m: f64,
    /// Accepted re-sightings at least this far from the prior fix raise an alert.
    pub alert_distance_miles: f64,
    pub output_dir: PathBuf,
    pub kml_document_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suppress_radius_m: 100.0,
            alert_distance_miles: 10.0,
            output_dir: PathBuf::from("runs"),
            kml_document_name: "Emitter Logger".into(),
        }
    }
}

/// Timer cadence and per-poll throttles for the scan orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub location_interval_ms: u64,
    pub scan_interval_ms: u64,
    pub wifi_scan_min_gap_ms: u64,
    pub wifi_snapshot_min_gap_ms: u64,
    pub notify_min_gap_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            location_interval_ms: 10_000,
            scan_interval_ms: 15_000,
            wifi_scan_min_gap_ms: 30_000,
            wifi_snapshot_min_gap_ms: 5_000,
            notify_min_gap_ms: 5_000,
        }
    }
}

impl ScheduleConfig {
    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms.max(1))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn wifi_scan_min_gap(&self) -> Duration {
        Duration::from_millis(self.wifi_scan_min_gap_ms)
    }

    pub fn wifi_snapshot_min_gap(&self) -> Duration {
        Duration::from_millis(self.wifi_snapshot_min_gap_ms)
    }

    pub fn notify_min_gap(&self) -> Duration {
        Duration::from_millis(self.notify_min_gap_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_schedule_json_keeps_defaults() {
        let cfg: ScheduleConfig = serde_json::from_str(r#"{"scan_interval_ms": 1000}"#).unwrap();
        assert_eq!(cfg.scan_interval(), Duration::from_secs(1));
        assert_eq!(cfg.location_interval(), Duration::from_secs(10));
        assert_eq!(cfg.wifi_scan_min_gap(), Duration::from_secs(30));
    }

    #[test]
    fn engine_defaults_match_thresholds() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.suppress_radius_m, 100.0);
        assert_eq!(cfg.alert_distance_miles, 10.0);
    }
}
