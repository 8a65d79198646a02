use crate::ingestion::WifiScanResult;
use crate::prelude::{SightResult, StatusUpdate};

/// Platform scanning collaborators. Requests return immediately; results
/// come back later through a [`ScanHandle`](super::ScanHandle). Errors such as
/// `PermissionDenied` only skip that poll.
pub trait ScanSources: Send {
    fn request_location(&mut self) -> SightResult<()>;
    fn trigger_wifi_scan(&mut self) -> SightResult<()>;
    /// Cached results of the most recent Wi-Fi scan.
    fn wifi_snapshot(&mut self) -> SightResult<Vec<WifiScanResult>>;
    fn restart_bt_discovery(&mut self) -> SightResult<()>;
    fn cancel_bt_discovery(&mut self) -> SightResult<()>;
    fn start_ble_scan(&mut self) -> SightResult<()>;
    fn stop_ble_scan(&mut self) -> SightResult<()>;
    fn request_cell_info(&mut self) -> SightResult<()>;
}

/// Receives status and alert signals from the orchestrator.
pub trait EngineListener: Send {
    fn on_status(&mut self, status: &StatusUpdate);
    fn on_alert(&mut self, message: &str);
    /// Rate-limited twin of `on_status` for persistent notifications.
    fn on_notification(&mut self, _status: &StatusUpdate) {}
}

/// Listener that discards everything.
#[derive(Debug, Default)]
pub struct NullListener;

impl EngineListener for NullListener {
    fn on_status(&mut self, _status: &StatusUpdate) {}
    fn on_alert(&mut self, _message: &str) {}
}
