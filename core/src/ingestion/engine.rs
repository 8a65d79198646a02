use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::aggregation::AggregateSet;
use crate::config::EngineConfig;
use crate::ingestion::dedup::{Decision, DedupTable};
use crate::prelude::{
    format_timestamp, Clock, DeviceKey, Location, RawDetection, SightResult, Sighting,
    StatusUpdate, TypeCounts,
};
use crate::settings::{Preferences, RunPaths};
use crate::store::{purge_run, run_stamp, RunLog};
use crate::telemetry::{IngestMetrics, LogManager, MetricsRecorder};

/// What happened to one raw detection.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The device is whitelisted.
    Rejected,
    /// Too close to the device baseline to be new information.
    Suppressed { distance_m: f64 },
    Accepted {
        sighting: Sighting,
        alert: Option<String>,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn alert(&self) -> Option<&str> {
        match self {
            IngestOutcome::Accepted { alert, .. } => alert.as_deref(),
            _ => None,
        }
    }
}

pub fn alert_message(miles: f64, sighting: &Sighting) -> String {
    format!(
        "GPS moved {:.1} mi and device seen again: {} {}",
        miles, sighting.emitter, sighting.name
    )
}

/// Decides whether each detection is new information and records it.
///
/// All per-run state lives here and is mutated through `&mut self`, so a
/// single owner serializes the read-modify-write for every device.
pub struct IngestionEngine {
    config: EngineConfig,
    preferences: Arc<dyn Preferences>,
    clock: Box<dyn Clock>,
    dedup: DedupTable,
    sightings: Vec<Sighting>,
    live: AggregateSet,
    run: Option<RunLog>,
    dwell: bool,
    location: Option<Location>,
    counts: TypeCounts,
    last_timestamp: Option<DateTime<Utc>>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl IngestionEngine {
    pub fn new(config: EngineConfig, preferences: Arc<dyn Preferences>, clock: Box<dyn Clock>) -> Self {
        let dwell = preferences.dwell_mode();
        Self {
            dedup: DedupTable::new(&config),
            config,
            preferences,
            clock,
            sightings: Vec::new(),
            live: AggregateSet::new(),
            run: None,
            dwell,
            location: None,
            counts: TypeCounts::default(),
            last_timestamp: None,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("ingestion"),
        }
    }

    /// Never earlier than the previous timestamp handed out.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let stamped = match self.last_timestamp {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.last_timestamp = Some(stamped);
        stamped
    }

    /// Resets per-run state and opens a fresh run log, superseding any
    /// active one.
    pub fn start_run(&mut self) -> SightResult<RunPaths> {
        if self.run.is_some() {
            self.end_run();
        }
        self.dedup.clear();
        self.sightings.clear();
        self.live = AggregateSet::new();
        self.counts = TypeCounts::default();
        self.metrics.reset();
        self.dwell = self.preferences.dwell_mode();

        let stamp = run_stamp(self.clock.now());
        let mut run = RunLog::create(&self.config.output_dir, &stamp, &self.config.kml_document_name)?;
        if self.dwell {
            run.open_dwell(&stamp)?;
        }
        let paths = run.paths();
        self.preferences.set_last_run(paths.clone())?;
        self.run = Some(run);
        self.logger.record(&format!("run {} started", stamp));
        Ok(paths)
    }

    /// Closes the active run. In-memory sightings stay available until the
    /// next run starts.
    pub fn end_run(&mut self) -> Option<RunPaths> {
        let run = self.run.take()?;
        let paths = run.paths();
        self.dedup.clear();
        let metrics = self.metrics.snapshot();
        self.logger.record(&format!(
            "run {} ended: {} accepted, {} suppressed, {} rejected, {} alerts",
            run.stamp(),
            metrics.accepted,
            metrics.suppressed,
            metrics.rejected,
            metrics.alerts
        ));
        Some(paths)
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn update_location(&mut self, location: Location) {
        self.location = Some(location);
    }

    /// The provider reported no fix; later detections are accepted unlocated.
    pub fn clear_location(&mut self) {
        self.location = None;
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn dwell_mode(&self) -> bool {
        self.dwell
    }

    /// Persists the mode; switching it on mid-run opens a new dwell log.
    pub fn set_dwell_mode(&mut self, enabled: bool) -> SightResult<()> {
        self.preferences.set_dwell_mode(enabled)?;
        let was = self.dwell;
        self.dwell = enabled;
        if enabled && !was {
            let stamp = run_stamp(self.clock.now());
            if let Some(run) = self.run.as_mut() {
                run.open_dwell(&stamp)?;
                self.preferences.set_last_run(run.paths())?;
            }
        }
        self.logger
            .detail(&format!("dwell mode {}", if enabled { "on" } else { "off" }));
        Ok(())
    }

    pub fn ingest(&mut self, detection: RawDetection) -> IngestOutcome {
        let key = detection.key();
        if self.preferences.is_whitelisted(&key) {
            self.metrics.record_rejected();
            return IngestOutcome::Rejected;
        }

        let location = detection.location.or(self.location);
        let moved_miles = match self.dedup.evaluate(&key, location, self.dwell) {
            Decision::Suppress { distance_m } => {
                self.metrics.record_suppressed();
                return IngestOutcome::Suppressed { distance_m };
            }
            Decision::Accept { moved_miles } => moved_miles,
        };

        let timestamp = self.next_timestamp();
        let sighting = Sighting {
            timestamp: format_timestamp(timestamp),
            latitude: location.map(|loc| loc.latitude),
            longitude: location.map(|loc| loc.longitude),
            emitter: detection.emitter,
            name: detection.name,
            id: detection.id,
            rssi: detection.rssi,
        };
        self.sightings.push(sighting.clone());
        self.live.observe(&sighting);
        self.counts.increment(sighting.emitter);
        self.metrics.record_accepted();

        if let Some(run) = self.run.as_mut() {
            let report = run.record(&sighting, &self.sightings, self.dwell);
            for _ in 0..report.failures {
                self.metrics.record_sink_failure();
            }
            if report.relocated {
                if let Err(err) = self.preferences.set_last_run(run.paths()) {
                    self.logger
                        .degraded(&format!("could not save relocated run paths: {}", err));
                }
            }
        }

        let alert = moved_miles
            .filter(|miles| *miles >= self.config.alert_distance_miles)
            .map(|miles| {
                self.metrics.record_alert();
                let message = alert_message(miles, &sighting);
                self.logger.record(&message);
                message
            });

        IngestOutcome::Accepted { sighting, alert }
    }

    /// Adds or removes `key` from the whitelist. Adding purges the device from
    /// memory and from the active run files, or the last run's files when
    /// idle. Returns the number of persisted rows removed.
    pub fn set_whitelisted(&mut self, key: &DeviceKey, added: bool) -> SightResult<usize> {
        let changed = self.preferences.set_whitelisted(key, added)?;
        if !added || !changed {
            return Ok(0);
        }

        self.sightings.retain(|s| !s.matches(key));
        self.live.remove(key);
        self.dedup.forget(key);

        match self.run.as_mut() {
            Some(run) => run.purge(key),
            None => purge_run(
                &self.preferences.last_run(),
                &self.config.kml_document_name,
                key,
            ),
        }
    }

    pub fn status(&self) -> StatusUpdate {
        let grid = self
            .location
            .map(|loc| loc.grid_reference())
            .unwrap_or_default();
        StatusUpdate::new(self.counts, grid)
    }

    pub fn sightings(&self) -> &[Sighting] {
        &self.sightings
    }

    pub fn aggregates(&self) -> &AggregateSet {
        &self.live
    }

    pub fn run_paths(&self) -> Option<RunPaths> {
        self.run.as_ref().map(RunLog::paths)
    }

    pub fn run_stamp(&self) -> Option<&str> {
        self.run.as_ref().map(RunLog::stamp)
    }

    pub fn dedup(&self) -> &DedupTable {
        &self.dedup
    }

    pub fn metrics(&self) -> IngestMetrics {
        self.metrics.snapshot()
    }
}
