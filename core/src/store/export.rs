use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregation::{co_traveler_report, AggregateSet, DistanceBin, ReportMode};
use crate::prelude::{DeviceKey, SightResult, Sighting};
use crate::store::csv_log::{read_sightings, write_csv};
use crate::store::kml::write_kml;
use crate::telemetry::LogManager;

/// Files written by one save-run export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportSummary {
    pub bins: Vec<(DistanceBin, usize)>,
    pub files: Vec<PathBuf>,
}

fn write_pair(
    out_dir: &Path,
    stem: &str,
    document_name: &str,
    rows: &[Sighting],
    files: &mut Vec<PathBuf>,
) -> SightResult<()> {
    let csv_path = out_dir.join(format!("{}.csv", stem));
    let kml_path = out_dir.join(format!("{}.kml", stem));
    write_csv(&csv_path, rows)?;
    write_kml(&kml_path, document_name, rows)?;
    files.push(csv_path);
    files.push(kml_path);
    Ok(())
}

/// Splits a finished run into one CSV/KML pair per non-empty co-traveler
/// distance bin, each holding every sighting of the bin's devices. A
/// non-empty dwell log is exported alongside as `run_{stamp}_dwell`.
pub fn export_run(
    csv_path: &Path,
    dwell_csv: Option<&Path>,
    out_dir: &Path,
    stamp: &str,
    document_name: &str,
) -> SightResult<ExportSummary> {
    let logger = LogManager::new("export");
    fs::create_dir_all(out_dir)?;
    let sightings = read_sightings(csv_path, None)?;
    let set = AggregateSet::from_sightings(&sightings);
    let mut summary = ExportSummary::default();

    for bin in DistanceBin::ALL {
        let devices: HashSet<&DeviceKey> = co_traveler_report(&set, ReportMode::Distance(bin))
            .into_iter()
            .map(|agg| &agg.key)
            .collect();
        if devices.is_empty() {
            continue;
        }
        let rows: Vec<Sighting> = sightings
            .iter()
            .filter(|s| devices.contains(&s.key()))
            .cloned()
            .collect();
        let stem = format!("run_{}_{}", stamp, bin.suffix());
        let name = format!("{} ({})", document_name, bin);
        write_pair(out_dir, &stem, &name, &rows, &mut summary.files)?;
        summary.bins.push((bin, devices.len()));
    }

    if let Some(dwell) = dwell_csv {
        let rows = read_sightings(dwell, None)?;
        if !rows.is_empty() {
            let stem = format!("run_{}_dwell", stamp);
            let name = format!("{} (dwell)", document_name);
            write_pair(out_dir, &stem, &name, &rows, &mut summary.files)?;
        }
    }

    logger.record(&format!(
        "exported {} files for run {}",
        summary.files.len(),
        stamp
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::EmitterType;
    use tempfile::tempdir;

    fn at(id: &str, sec: u32, lat: f64) -> Sighting {
        Sighting {
            timestamp: format!("2024-05-01T12:00:{:02}.000Z", sec),
            latitude: Some(lat),
            longitude: Some(0.0),
            emitter: EmitterType::Bt,
            name: id.to_lowercase(),
            id: id.into(),
            rssi: -70,
        }
    }

    // Roughly one mile of latitude.
    const MILE: f64 = 1.0 / 69.0941;

    #[test]
    fn writes_one_pair_per_populated_bin() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run_s.csv");
        let rows = vec![
            at("NEAR", 0, 0.0),
            at("FAR", 1, 0.0),
            at("NEAR", 2, 3.0 * MILE),
            at("ONCE", 3, 50.0 * MILE),
            at("FAR", 4, 15.0 * MILE),
        ];
        write_csv(&csv, &rows).unwrap();

        let out = dir.path().join("out");
        let summary = export_run(&csv, None, &out, "s", "Run").unwrap();
        assert_eq!(
            summary.bins,
            vec![(DistanceBin::From2To4, 1), (DistanceBin::TenPlus, 1)]
        );
        assert_eq!(summary.files.len(), 4);

        let near = read_sightings(&out.join("run_s_co_2.csv"), None).unwrap();
        assert_eq!(near, vec![rows[0].clone(), rows[2].clone()]);
        let far = read_sightings(&out.join("run_s_co_10plus.csv"), None).unwrap();
        assert_eq!(far.len(), 2);
        assert!(out.join("run_s_co_10plus.kml").exists());
        assert!(!out.join("run_s_co_4.csv").exists());
    }

    #[test]
    fn dwell_log_is_exported_when_non_empty() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        let dwell = dir.path().join("dwell.csv");
        write_csv(&csv, &[at("A", 0, 0.0)]).unwrap();
        write_csv(&dwell, &[at("A", 0, 0.0)]).unwrap();

        let summary = export_run(&csv, Some(&dwell), dir.path(), "s", "Run").unwrap();
        assert!(summary.bins.is_empty());
        assert_eq!(summary.files.len(), 2);
        assert!(dir.path().join("run_s_dwell.kml").exists());

        write_csv(&dwell, &[]).unwrap();
        let summary = export_run(&csv, Some(&dwell), dir.path(), "t", "Run").unwrap();
        assert!(summary.files.is_empty());
    }
}
