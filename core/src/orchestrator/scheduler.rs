use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use crate::config::ScheduleConfig;
use crate::ingestion::{IngestOutcome, IngestionEngine};
use crate::orchestrator::handle::{Command, Inbox};
use crate::orchestrator::sources::{EngineListener, ScanSources};
use crate::orchestrator::throttle::Throttle;
use crate::prelude::{RawDetection, SightResult};
use crate::settings::RunPaths;
use crate::telemetry::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

struct Timers {
    location: Interval,
    scan: Interval,
}

impl Timers {
    /// The immediate round is fired by `start`, so both timers first tick one
    /// period later.
    fn arm(schedule: &ScheduleConfig) -> Self {
        let start = Instant::now();
        let make = |period: Duration| {
            let mut timer = interval_at(start + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        };
        Self {
            location: make(schedule.location_interval()),
            scan: make(schedule.scan_interval()),
        }
    }
}

enum Event {
    Command(Command),
    LocationTick,
    ScanTick,
}

/// Owns the ingestion engine and drives the periodic polls. Every mutation of
/// per-run state happens on this task.
pub struct ScanOrchestrator {
    engine: IngestionEngine,
    sources: Box<dyn ScanSources>,
    listener: Box<dyn EngineListener>,
    schedule: ScheduleConfig,
    inbox: Inbox,
    state: ScanState,
    wifi_scan: Throttle,
    wifi_snapshot: Throttle,
    notify: Throttle,
    logger: LogManager,
}

impl ScanOrchestrator {
    pub fn new(
        engine: IngestionEngine,
        sources: Box<dyn ScanSources>,
        listener: Box<dyn EngineListener>,
        schedule: ScheduleConfig,
        inbox: Inbox,
    ) -> Self {
        Self {
            wifi_scan: Throttle::new(schedule.wifi_scan_min_gap()),
            wifi_snapshot: Throttle::new(schedule.wifi_snapshot_min_gap()),
            notify: Throttle::new(schedule.notify_min_gap()),
            engine,
            sources,
            listener,
            schedule,
            inbox,
            state: ScanState::Idle,
            logger: LogManager::new("orchestrator"),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Runs until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        let mut timers: Option<Timers> = None;
        loop {
            let event = match timers.as_mut() {
                None => match self.inbox.0.recv().await {
                    Some(command) => Event::Command(command),
                    None => break,
                },
                Some(active) => tokio::select! {
                    command = self.inbox.0.recv() => match command {
                        Some(command) => Event::Command(command),
                        None => break,
                    },
                    _ = active.location.tick() => Event::LocationTick,
                    _ = active.scan.tick() => Event::ScanTick,
                },
            };

            match event {
                Event::LocationTick => self.poll_location(),
                Event::ScanTick => self.scan_round(),
                Event::Command(Command::Start(reply)) => {
                    let result = self.start();
                    if result.is_ok() {
                        timers = Some(Timers::arm(&self.schedule));
                    }
                    let _ = reply.send(result);
                }
                Event::Command(Command::Stop(reply)) => {
                    timers = None;
                    let _ = reply.send(self.stop());
                }
                Event::Command(Command::Shutdown) => {
                    self.stop();
                    break;
                }
                Event::Command(command) => self.handle(command),
            }
        }
        self.logger.record("orchestrator stopped");
    }

    fn start(&mut self) -> SightResult<RunPaths> {
        let paths = self.engine.start_run()?;
        self.state = ScanState::Scanning;
        self.wifi_scan.reset();
        self.wifi_snapshot.reset();
        self.notify.reset();

        self.poll_location();
        self.poll("ble scan", |sources| sources.start_ble_scan());
        self.scan_round();
        self.publish_status();
        Ok(paths)
    }

    fn stop(&mut self) -> Option<RunPaths> {
        if self.state == ScanState::Idle {
            return None;
        }
        self.state = ScanState::Idle;
        self.poll("ble scan stop", |sources| sources.stop_ble_scan());
        self.poll("bt discovery cancel", |sources| sources.cancel_bt_discovery());
        self.engine.end_run()
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Detections(detections) => self.ingest(detections),
            Command::Location(update) => {
                if self.state == ScanState::Idle {
                    self.logger.detail("location update while idle ignored");
                    return;
                }
                match update {
                    Some(location) => self.engine.update_location(location),
                    None => self.engine.clear_location(),
                }
                self.publish_status();
            }
            Command::DwellMode(enabled, reply) => {
                let _ = reply.send(self.engine.set_dwell_mode(enabled));
            }
            Command::Whitelist { key, added, reply } => {
                let result = self.engine.set_whitelisted(&key, added);
                if let Err(err) = &result {
                    self.logger
                        .degraded(&format!("whitelist change for {} failed: {}", key, err));
                }
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.engine.status());
            }
            Command::Sightings(reply) => {
                let _ = reply.send(self.engine.sightings().to_vec());
            }
            Command::Start(_) | Command::Stop(_) | Command::Shutdown => {}
        }
    }

    fn ingest(&mut self, detections: Vec<RawDetection>) {
        if self.state == ScanState::Idle {
            self.logger.detail(&format!(
                "dropping {} detections delivered after stop",
                detections.len()
            ));
            return;
        }
        for detection in detections {
            if let IngestOutcome::Accepted {
                alert: Some(message),
                ..
            } = self.engine.ingest(detection)
            {
                self.listener.on_alert(&message);
            }
        }
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let status = self.engine.status();
        self.listener.on_status(&status);
        if self.notify.ready() {
            self.listener.on_notification(&status);
        }
    }

    /// Runs one collaborator call, logging and skipping it on failure.
    fn poll<T>(
        &mut self,
        what: &str,
        call: impl FnOnce(&mut Box<dyn ScanSources>) -> SightResult<T>,
    ) -> Option<T> {
        match call(&mut self.sources) {
            Ok(value) => Some(value),
            Err(err) => {
                self.logger.degraded(&format!("{} skipped: {}", what, err));
                None
            }
        }
    }

    fn poll_location(&mut self) {
        self.poll("location request", |sources| sources.request_location());
    }

    fn scan_round(&mut self) {
        if self.wifi_scan.ready() {
            self.poll("wifi scan", |sources| sources.trigger_wifi_scan());
        }
        self.poll("bt discovery", |sources| sources.restart_bt_discovery());
        if self.wifi_snapshot.ready() {
            if let Some(results) = self.poll("wifi snapshot", |sources| sources.wifi_snapshot()) {
                if !results.is_empty() {
                    self.ingest(results.into_iter().map(RawDetection::from).collect());
                }
            }
        }
        self.poll("cell info", |sources| sources.request_cell_info());
    }
}
