use std::io;
use std::path::{Path, PathBuf};

use crate::prelude::{SightError, SightResult, Sighting};
use crate::telemetry::LogManager;

/// A persistence target for accepted sightings.
pub trait SightingSink {
    fn path(&self) -> &Path;
    /// Persists `latest`; `history` is the whole run, `latest` included.
    fn write(&mut self, latest: &Sighting, history: &[Sighting]) -> io::Result<()>;
    /// Moves the sink onto a fresh underlying file.
    fn recreate(&mut self) -> io::Result<()>;
    /// Files this sink wrote before its current one, oldest first.
    fn superseded(&self) -> &[PathBuf] {
        &[]
    }
}

/// Writes through `sink`, recreating it and retrying once on failure.
pub fn write_with_retry(
    sink: &mut dyn SightingSink,
    latest: &Sighting,
    history: &[Sighting],
    logger: &LogManager,
) -> SightResult<()> {
    let first = match sink.write(latest, history) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    logger.degraded(&format!(
        "write to {} failed ({}); recreating sink",
        sink.path().display(),
        first
    ));

    let retried = sink
        .recreate()
        .and_then(|()| sink.write(latest, history));
    retried.map_err(|source| SightError::SinkWrite {
        path: sink.path().to_path_buf(),
        source,
    })
}

/// `run.csv` -> `run-2.csv` for generation 2.
pub fn generation_path(base: &Path, generation: u32) -> PathBuf {
    if generation == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}-{}.{}", stem, generation, ext.to_string_lossy()),
        None => format!("{}-{}", stem, generation),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::EmitterType;

    struct FlakySink {
        failures_left: usize,
        recreated: usize,
        written: usize,
    }

    impl SightingSink for FlakySink {
        fn path(&self) -> &Path {
            Path::new("flaky.csv")
        }

        fn write(&mut self, _latest: &Sighting, _history: &[Sighting]) -> io::Result<()> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "disk gone"));
            }
            self.written += 1;
            Ok(())
        }

        fn recreate(&mut self) -> io::Result<()> {
            self.recreated += 1;
            Ok(())
        }
    }

    fn sample() -> Sighting {
        Sighting {
            timestamp: "2024-05-01T12:00:00.000Z".into(),
            latitude: None,
            longitude: None,
            emitter: EmitterType::Bt,
            name: "Headset".into(),
            id: "00:11".into(),
            rssi: -70,
        }
    }

    #[test]
    fn single_failure_is_recovered_by_recreation() {
        let mut sink = FlakySink {
            failures_left: 1,
            recreated: 0,
            written: 0,
        };
        let logger = LogManager::new("test");
        write_with_retry(&mut sink, &sample(), &[], &logger).unwrap();
        assert_eq!(sink.recreated, 1);
        assert_eq!(sink.written, 1);
    }

    #[test]
    fn second_failure_surfaces_as_sink_write() {
        let mut sink = FlakySink {
            failures_left: 2,
            recreated: 0,
            written: 0,
        };
        let logger = LogManager::new("test");
        let err = write_with_retry(&mut sink, &sample(), &[], &logger).unwrap_err();
        assert!(matches!(err, SightError::SinkWrite { .. }));
        assert_eq!(sink.written, 0);
    }

    #[test]
    fn generation_paths_keep_extension() {
        let base = Path::new("/tmp/runs/run_01.csv");
        assert_eq!(generation_path(base, 0), base);
        assert_eq!(generation_path(base, 3), Path::new("/tmp/runs/run_01-3.csv"));
    }
}
