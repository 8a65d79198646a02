//! Durable sighting logs: the append-only CSV, the fully regenerated KML, the
//! reader that reconstructs sightings, and whitelist-driven rewrites.

pub mod csv_log;
pub mod export;
pub mod kml;
pub mod run_log;
pub mod sink;

pub use csv_log::{read_sightings, write_csv, CsvSink, CSV_HEADER};
pub use export::{export_run, ExportSummary};
pub use kml::{render_kml, write_kml, KmlSink};
pub use run_log::{run_stamp, RecordReport, RunLog};
pub use sink::SightingSink;

use std::path::{Path, PathBuf};

use crate::prelude::{DeviceKey, SightResult};
use crate::settings::RunPaths;
use crate::telemetry::LogManager;

/// Filters every sighting of `key` out of the CSV at `csv_path` and rewrites
/// it; when `kml` is given, that KML is regenerated from the filtered set.
/// Returns the number of rows removed.
pub fn purge_device(
    csv_path: &Path,
    kml: Option<(&Path, &str)>,
    key: &DeviceKey,
) -> SightResult<usize> {
    let kml_files: Vec<PathBuf> = kml.iter().map(|(path, _)| path.to_path_buf()).collect();
    let document_name = kml.map(|(_, name)| name).unwrap_or_default();
    purge_files(&[csv_path.to_path_buf()], &kml_files, document_name, key)
}

/// Purges `key` from every file a run wrote, superseded generations included.
pub fn purge_run(paths: &RunPaths, document_name: &str, key: &DeviceKey) -> SightResult<usize> {
    purge_files(&paths.csv_files(), &paths.kml_files(), document_name, key)
}

/// Rewrites each existing CSV without `key`, then regenerates each KML from
/// the rows kept across all of them. Files that no longer exist are skipped.
pub fn purge_files(
    csv_files: &[PathBuf],
    kml_files: &[PathBuf],
    document_name: &str,
    key: &DeviceKey,
) -> SightResult<usize> {
    let logger = LogManager::new("store");
    let mut removed = 0;
    let mut kept_rows = Vec::new();
    let mut rewritten = 0;
    for csv_path in csv_files.iter().filter(|path| path.exists()) {
        let records = read_sightings(csv_path, None)?;
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|s| !s.matches(key)).collect();
        write_csv(csv_path, &kept)?;
        removed += before - kept.len();
        rewritten += 1;
        logger.detail(&format!(
            "purged {} rows of {} from {}",
            before - kept.len(),
            key,
            csv_path.display()
        ));
        kept_rows.extend(kept);
    }
    if rewritten == 0 {
        return Ok(0);
    }

    for kml_path in kml_files {
        let is_current = Some(kml_path) == kml_files.last();
        if is_current || kml_path.exists() {
            write_kml(kml_path, document_name, &kept_rows)?;
        }
    }
    logger.record(&format!("purged {} rows of {} in total", removed, key));
    Ok(removed)
}
