pub mod dedup;
pub mod detection;
pub mod engine;

pub use dedup::{Decision, DedupState, DedupTable};
pub use detection::{CellIdentity, CellInfo, RadioSighting, WifiScanResult, HIDDEN_SSID, UNKNOWN_NAME};
pub use engine::{alert_message, IngestOutcome, IngestionEngine};
