use tokio::sync::{mpsc, oneshot};

use crate::ingestion::{CellInfo, RadioSighting, WifiScanResult};
use crate::prelude::{
    DeviceKey, Location, RawDetection, SightError, SightResult, Sighting, StatusUpdate,
};
use crate::settings::RunPaths;

pub(crate) enum Command {
    Start(oneshot::Sender<SightResult<RunPaths>>),
    Stop(oneshot::Sender<Option<RunPaths>>),
    Detections(Vec<RawDetection>),
    Location(Option<Location>),
    DwellMode(bool, oneshot::Sender<SightResult<()>>),
    Whitelist {
        key: DeviceKey,
        added: bool,
        reply: oneshot::Sender<SightResult<usize>>,
    },
    Status(oneshot::Sender<StatusUpdate>),
    Sightings(oneshot::Sender<Vec<Sighting>>),
    Shutdown,
}

/// Receiving side of the orchestrator inbox.
pub struct Inbox(pub(crate) mpsc::UnboundedReceiver<Command>);

/// Cloneable entry point for every producer. Messages are processed one at
/// a time by the orchestrator task in arrival order.
#[derive(Clone)]
pub struct ScanHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ScanHandle {
    pub fn channel() -> (ScanHandle, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ScanHandle { tx }, Inbox(rx))
    }

    fn send(&self, command: Command) -> SightResult<()> {
        self.tx.send(command).map_err(|_| SightError::Closed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> SightResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| SightError::Closed)
    }

    pub async fn start(&self) -> SightResult<RunPaths> {
        self.request(Command::Start).await?
    }

    pub async fn stop(&self) -> SightResult<Option<RunPaths>> {
        self.request(Command::Stop).await
    }

    pub fn detection(&self, detection: RawDetection) -> SightResult<()> {
        self.send(Command::Detections(vec![detection]))
    }

    pub fn detections(&self, detections: Vec<RawDetection>) -> SightResult<()> {
        self.send(Command::Detections(detections))
    }

    pub fn wifi_results(&self, results: Vec<WifiScanResult>) -> SightResult<()> {
        self.detections(results.into_iter().map(RawDetection::from).collect())
    }

    pub fn bluetooth_found(&self, found: RadioSighting) -> SightResult<()> {
        self.detection(found.bluetooth())
    }

    pub fn ble_result(&self, result: RadioSighting) -> SightResult<()> {
        self.detection(result.ble())
    }

    pub fn cell_info(&self, cells: Vec<CellInfo>) -> SightResult<()> {
        self.detections(cells.into_iter().map(RawDetection::from).collect())
    }

    pub fn location(&self, location: Location) -> SightResult<()> {
        self.send(Command::Location(Some(location)))
    }

    /// The provider lost its fix.
    pub fn location_lost(&self) -> SightResult<()> {
        self.send(Command::Location(None))
    }

    pub async fn set_dwell_mode(&self, enabled: bool) -> SightResult<()> {
        self.request(|reply| Command::DwellMode(enabled, reply)).await?
    }

    pub async fn set_whitelisted(&self, key: DeviceKey, added: bool) -> SightResult<usize> {
        self.request(|reply| Command::Whitelist { key, added, reply })
            .await?
    }

    pub async fn status(&self) -> SightResult<StatusUpdate> {
        self.request(Command::Status).await
    }

    pub async fn sightings(&self) -> SightResult<Vec<Sighting>> {
        self.request(Command::Sightings).await
    }

    pub fn shutdown(&self) -> SightResult<()> {
        self.send(Command::Shutdown)
    }
}
