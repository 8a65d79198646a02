use std::sync::Arc;

use sightcore::aggregation::{co_traveler_report, format_report_line, AggregateSet, ReportMode};
use sightcore::ingestion::WifiScanResult;
use sightcore::orchestrator::{Inbox, NullListener};
use sightcore::store::{export_run, read_sightings};
use sightcore::{
    EmitterType, EngineConfig, IngestOutcome, IngestionEngine, Location, RawDetection,
    ScanHandle, ScanOrchestrator, ScanSources, ScheduleConfig, SettingsStore, SightResult,
    SystemClock,
};
use tempfile::tempdir;

fn cafe(rssi: i32, lat: f64, lon: f64) -> RawDetection {
    RawDetection::new(EmitterType::Wifi, "Cafe", "AA:BB", rssi).at(Location::new(lat, lon))
}

fn route() -> Vec<RawDetection> {
    vec![
        cafe(-60, 40.0, -74.0),
        cafe(-58, 40.0, -74.0009),
        cafe(-55, 40.05, -74.0),
        cafe(-50, 40.2, -74.0),
    ]
}

#[test]
fn four_detections_yield_three_sightings_and_one_alert() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        output_dir: dir.path().to_path_buf(),
        ..EngineConfig::default()
    };
    let mut engine = IngestionEngine::new(
        config,
        Arc::new(SettingsStore::in_memory()),
        Box::new(SystemClock),
    );
    let paths = engine.start_run().unwrap();

    let outcomes: Vec<IngestOutcome> = route().into_iter().map(|d| engine.ingest(d)).collect();
    assert!(outcomes[0].is_accepted());
    assert!(matches!(outcomes[1], IngestOutcome::Suppressed { distance_m } if distance_m < 100.0));
    assert!(outcomes[2].is_accepted() && outcomes[2].alert().is_none());
    assert!(outcomes[3].alert().unwrap().starts_with("GPS moved 10.4 mi"));
    engine.end_run();

    let rows = read_sightings(paths.csv.as_deref().unwrap(), None).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].rssi, -50);

    let set = AggregateSet::from_sightings(&rows);
    let report = co_traveler_report(&set, ReportMode::MostSeen);
    assert_eq!(report.len(), 1);
    let device = report[0];
    assert_eq!(device.count, 3);
    // Point A to point D, the farthest pair.
    assert!((device.max_distance_miles - 13.82).abs() < 0.01);
    assert_eq!(
        format_report_line(device),
        "Cafe | AA:BB | RSSI -50 | Seen 3 | Max 13.8 mi"
    );

    let summary = export_run(
        paths.csv.as_deref().unwrap(),
        None,
        &dir.path().join("export"),
        "e2e",
        "Emitter Logger",
    )
    .unwrap();
    assert_eq!(summary.files.len(), 2);
    assert!(dir.path().join("export/run_e2e_co_10plus.kml").exists());
}

struct QuietSources;

impl ScanSources for QuietSources {
    fn request_location(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn trigger_wifi_scan(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn wifi_snapshot(&mut self) -> SightResult<Vec<WifiScanResult>> {
        Ok(Vec::new())
    }
    fn restart_bt_discovery(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn cancel_bt_discovery(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn start_ble_scan(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn stop_ble_scan(&mut self) -> SightResult<()> {
        Ok(())
    }
    fn request_cell_info(&mut self) -> SightResult<()> {
        Ok(())
    }
}

fn orchestrator(dir: &std::path::Path) -> (ScanHandle, ScanOrchestrator) {
    let engine = IngestionEngine::new(
        EngineConfig {
            output_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        },
        Arc::new(SettingsStore::in_memory()),
        Box::new(SystemClock),
    );
    let (handle, inbox): (ScanHandle, Inbox) = ScanHandle::channel();
    let orchestrator = ScanOrchestrator::new(
        engine,
        Box::new(QuietSources),
        Box::new(NullListener),
        ScheduleConfig::default(),
        inbox,
    );
    (handle, orchestrator)
}

#[tokio::test]
async fn concurrent_producers_are_serialized_through_the_handle() {
    let dir = tempdir().unwrap();
    let (handle, orchestrator) = orchestrator(dir.path());
    let task = tokio::spawn(orchestrator.run());
    handle.start().await.unwrap();

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move {
                for detection in route() {
                    handle.detection(detection).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    // Whatever the interleaving, one device at four fixed points can only
    // be accepted at each distinct position beyond the suppression radius.
    let sightings = handle.sightings().await.unwrap();
    let status = handle.status().await.unwrap();
    assert_eq!(sightings.len(), status.wifi);
    assert!(sightings.len() >= 3);

    let paths = handle.stop().await.unwrap().unwrap();
    let persisted = read_sightings(paths.csv.as_deref().unwrap(), None).unwrap();
    assert_eq!(persisted, sightings);

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_producers_accept_a_nearby_device_once() {
    let dir = tempdir().unwrap();
    let (handle, orchestrator) = orchestrator(dir.path());
    let task = tokio::spawn(orchestrator.run());
    handle.start().await.unwrap();

    // Every fix lies within 50 m of the first, well inside the suppression radius.
    let producers: Vec<_> = (0..16)
        .map(|producer| {
            let handle = handle.clone();
            tokio::spawn(async move {
                for step in 0..10 {
                    let nudge = f64::from(producer * 10 + step) * 0.000_002;
                    let detection =
                        RawDetection::new(EmitterType::Ble, "Tag", "11:22:33", -70)
                            .at(Location::new(40.0 + nudge, -74.0));
                    handle.detection(detection).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let sightings = handle.sightings().await.unwrap();
    assert_eq!(sightings.len(), 1);
    assert_eq!(handle.status().await.unwrap().ble, 1);

    let paths = handle.stop().await.unwrap().unwrap();
    let persisted = read_sightings(paths.csv.as_deref().unwrap(), None).unwrap();
    assert_eq!(persisted, sightings);

    handle.shutdown().unwrap();
    task.await.unwrap();
}
