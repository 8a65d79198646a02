use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::prelude::{DeviceKey, SightResult, Sighting};
use crate::settings::RunPaths;
use crate::store::csv_log::CsvSink;
use crate::store::kml::KmlSink;
use crate::store::purge_run;
use crate::store::sink::{write_with_retry, SightingSink};
use crate::telemetry::LogManager;

/// `MM-dd-yyyy-HH-mm-ss`, used to name every file of a run.
pub fn run_stamp(now: DateTime<Utc>) -> String {
    now.format("%m-%d-%Y-%H-%M-%S").to_string()
}

/// Outcome of writing one sighting through every sink of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordReport {
    /// Sinks that dropped the sighting after their retry.
    pub failures: usize,
    /// A sink was recreated onto a new file, so the run paths changed.
    pub relocated: bool,
}

/// The CSV + KML pair bound to one scanning session, plus the optional dwell
/// log opened while dwell mode is on.
pub struct RunLog {
    dir: PathBuf,
    stamp: String,
    csv: CsvSink,
    kml: KmlSink,
    dwell: Option<CsvSink>,
    logger: LogManager,
}

impl RunLog {
    pub fn create(dir: &Path, stamp: &str, document_name: &str) -> SightResult<Self> {
        fs::create_dir_all(dir)?;
        let logger = LogManager::new("run-log");
        logger.record(&format!("opening run {} in {}", stamp, dir.display()));
        Ok(Self {
            dir: dir.to_path_buf(),
            stamp: stamp.to_string(),
            csv: CsvSink::new(dir.join(format!("run_{}.csv", stamp))),
            kml: KmlSink::new(dir.join(format!("run_{}.kml", stamp)), document_name),
            dwell: None,
            logger,
        })
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn csv_path(&self) -> &Path {
        self.csv.path()
    }

    pub fn kml_path(&self) -> &Path {
        self.kml.path()
    }

    pub fn dwell_path(&self) -> Option<&Path> {
        self.dwell.as_ref().map(|sink| sink.path())
    }

    pub fn paths(&self) -> RunPaths {
        RunPaths {
            csv: Some(self.csv_path().to_path_buf()),
            kml: Some(self.kml_path().to_path_buf()),
            dwell_csv: self.dwell_path().map(Path::to_path_buf),
            superseded_csv: self.csv.superseded().to_vec(),
            superseded_kml: self.kml.superseded().to_vec(),
        }
    }

    /// Starts a fresh dwell log, replacing any previous one for this run.
    pub fn open_dwell(&mut self, stamp: &str) -> SightResult<()> {
        let mut sink = CsvSink::new(self.dir.join(format!("dwell_{}.csv", stamp)));
        sink.initialize()?;
        self.logger
            .record(&format!("dwell log at {}", sink.path().display()));
        self.dwell = Some(sink);
        Ok(())
    }

    /// Writes an accepted sighting to every sink. Failures never propagate
    /// further; the report counts them and flags sinks that moved to a new file.
    pub fn record(&mut self, latest: &Sighting, history: &[Sighting], dwell: bool) -> RecordReport {
        let before = self.paths();
        let mut failures = 0;
        let mut sinks: Vec<&mut dyn SightingSink> = Vec::with_capacity(3);
        sinks.push(&mut self.csv);
        sinks.push(&mut self.kml);
        if dwell {
            if let Some(sink) = self.dwell.as_mut() {
                sinks.push(sink);
            }
        }
        for sink in sinks {
            if let Err(err) = write_with_retry(sink, latest, history, &self.logger) {
                failures += 1;
                self.logger
                    .degraded(&format!("dropping sighting {}: {}", latest.key(), err));
            }
        }
        RecordReport {
            failures,
            relocated: self.paths() != before,
        }
    }

    /// Removes every row of `key` from each CSV generation and regenerates
    /// the KML files.
    pub fn purge(&mut self, key: &DeviceKey) -> SightResult<usize> {
        purge_run(&self.paths(), self.kml.document_name(), key)
    }
}
