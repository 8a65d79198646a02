use crate::generator::profile::{build_world, World};
use crate::gui_bridge::model::{ModelListener, SharedModel};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use sightcore::geodesy::METERS_PER_MILE;
use sightcore::ingestion::WifiScanResult;
use sightcore::{
    EmitterType, IngestionEngine, Location, Preferences, RunPaths, ScanHandle, ScanOrchestrator,
    ScanSources, SettingsStore, SightError, SightResult, Sighting, StatusUpdate, SystemClock,
};
use std::sync::Arc;
use tokio::time::Instant;

/// Scan collaborators backed by a synthetic world. Results are pushed back
/// through the orchestrator handle as if they arrived from platform callbacks.
pub struct SimulatedSources {
    handle: ScanHandle,
    world: Arc<World>,
    config: WorkflowConfig,
    started: Instant,
    rng: StdRng,
    last_wifi: Vec<WifiScanResult>,
    ble_active: bool,
}

impl SimulatedSources {
    pub fn new(handle: ScanHandle, world: Arc<World>, config: WorkflowConfig) -> Self {
        Self {
            handle,
            world,
            rng: StdRng::seed_from_u64(config.world.seed.wrapping_add(1)),
            config,
            started: Instant::now(),
            last_wifi: Vec::new(),
            ble_active: false,
        }
    }

    fn position(&self) -> SightResult<Location> {
        let elapsed = self.config.simulated_secs(self.started.elapsed());
        self.world
            .route
            .position_at(elapsed)
            .ok_or(SightError::LocationUnavailable)
    }

    fn permit(&self, kind: EmitterType) -> SightResult<()> {
        if self.config.world.denied.contains(&kind) {
            return Err(SightError::PermissionDenied(kind.to_string()));
        }
        Ok(())
    }
}

impl ScanSources for SimulatedSources {
    fn request_location(&mut self) -> SightResult<()> {
        let here = self.position()?;
        self.handle.location(here)?;
        // BLE advertisements keep flowing between scan rounds.
        if self.ble_active {
            for result in self.world.radios(EmitterType::Ble, here, &mut self.rng) {
                self.handle.ble_result(result)?;
            }
        }
        Ok(())
    }

    fn trigger_wifi_scan(&mut self) -> SightResult<()> {
        self.permit(EmitterType::Wifi)?;
        let here = self.position()?;
        self.last_wifi = self.world.wifi_scan(here, &mut self.rng);
        self.handle.wifi_results(self.last_wifi.clone())
    }

    fn wifi_snapshot(&mut self) -> SightResult<Vec<WifiScanResult>> {
        self.permit(EmitterType::Wifi)?;
        Ok(self.last_wifi.clone())
    }

    fn restart_bt_discovery(&mut self) -> SightResult<()> {
        self.permit(EmitterType::Bt)?;
        let here = self.position()?;
        for found in self.world.radios(EmitterType::Bt, here, &mut self.rng) {
            self.handle.bluetooth_found(found)?;
        }
        Ok(())
    }

    fn cancel_bt_discovery(&mut self) -> SightResult<()> {
        Ok(())
    }

    fn start_ble_scan(&mut self) -> SightResult<()> {
        self.permit(EmitterType::Ble)?;
        self.ble_active = true;
        Ok(())
    }

    fn stop_ble_scan(&mut self) -> SightResult<()> {
        self.ble_active = false;
        Ok(())
    }

    fn request_cell_info(&mut self) -> SightResult<()> {
        self.permit(EmitterType::Cell)?;
        let here = self.position()?;
        let cells = self.world.cells(here, &mut self.rng);
        self.handle.cell_info(cells)
    }
}

pub struct WorkflowResult {
    pub paths: RunPaths,
    pub sightings: Vec<Sighting>,
    pub status: StatusUpdate,
    pub alerts: Vec<String>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn preferences(&self) -> anyhow::Result<Arc<dyn Preferences>> {
        let store = match &self.config.settings_path {
            Some(path) => SettingsStore::open(path)
                .with_context(|| format!("opening settings {}", path.display()))?,
            None => SettingsStore::in_memory(),
        };
        Ok(Arc::new(store))
    }

    /// Wires the engine, orchestrator and simulated sources together and
    /// returns the handle plus the orchestrator task.
    pub fn launch(
        &self,
        model: SharedModel,
    ) -> anyhow::Result<(ScanHandle, tokio::task::JoinHandle<()>)> {
        let preferences = self.preferences()?;
        preferences
            .set_dwell_mode(self.config.dwell)
            .context("persisting dwell mode")?;
        let engine = IngestionEngine::new(self.config.engine.clone(), preferences, Box::new(SystemClock));
        let world = Arc::new(build_world(&self.config.world));
        info!(
            "world: {} emitters along a {:.1} mi route",
            world.emitters.len(),
            world.route.length_m() / METERS_PER_MILE
        );
        let (handle, inbox) = ScanHandle::channel();
        let sources = SimulatedSources::new(handle.clone(), world, self.config.clone());
        let orchestrator = ScanOrchestrator::new(
            engine,
            Box::new(sources),
            Box::new(ModelListener::new(model)),
            self.config.wall_clock_schedule(),
            inbox,
        );
        Ok((handle, tokio::spawn(orchestrator.run())))
    }

    /// Runs one session for the configured duration, or until `interrupt`
    /// resolves first.
    pub async fn execute(
        &self,
        handle: &ScanHandle,
        model: &SharedModel,
        interrupt: impl std::future::Future<Output = ()>,
    ) -> anyhow::Result<WorkflowResult> {
        handle.start().await.context("starting scan session")?;
        info!(
            "simulating {} s of scanning in {:.1} s",
            self.config.duration_secs,
            self.config.wall_clock_duration().as_secs_f64()
        );
        tokio::select! {
            _ = tokio::time::sleep(self.config.wall_clock_duration()) => {}
            _ = interrupt => info!("session interrupted"),
        }

        let paths = handle
            .stop()
            .await
            .context("stopping scan session")?
            .unwrap_or_default();
        let status = handle.status().await.context("reading final status")?;
        let sightings = handle.sightings().await.context("collecting sightings")?;
        let alerts = model
            .read()
            .map(|model| model.alerts.clone())
            .unwrap_or_default();

        Ok(WorkflowResult {
            paths,
            sightings,
            status,
            alerts,
        })
    }
}
