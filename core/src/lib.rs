//! Sighting deduplication and geospatial aggregation core for the emitter
//! logger.
//!
//! Raw Wi-Fi, Bluetooth, BLE and cellular detections flow through the
//! ingestion engine, which suppresses re-sightings near a device's last
//! recorded position, persists accepted sightings to CSV and KML, and raises
//! alerts when a device reappears far from where it was last seen. The
//! aggregation layer turns sighting logs into co-traveler reports and the
//! live device list.

pub mod aggregation;
pub mod config;
pub mod geodesy;
pub mod ingestion;
pub mod orchestrator;
pub mod prelude;
pub mod settings;
pub mod store;
pub mod telemetry;

pub use config::{EngineConfig, ScheduleConfig};
pub use ingestion::{IngestOutcome, IngestionEngine};
pub use orchestrator::{EngineListener, ScanHandle, ScanOrchestrator, ScanSources};
pub use prelude::{
    Clock, DeviceKey, EmitterType, Location, RawDetection, SightError, SightResult, Sighting,
    StatusUpdate, SystemClock,
};
pub use settings::{Preferences, RunPaths, SettingsStore};
