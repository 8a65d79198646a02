use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::prelude::{EmitterType, SightError, SightResult, Sighting};
use crate::store::sink::{generation_path, SightingSink};
use crate::telemetry::LogManager;

pub const CSV_HEADER: [&str; 7] = ["timestamp", "latitude", "longitude", "type", "name", "id", "rssi"];

fn csv_fields(sighting: &Sighting) -> [String; 7] {
    [
        sighting.timestamp.clone(),
        sighting.latitude.map(|v| v.to_string()).unwrap_or_default(),
        sighting.longitude.map(|v| v.to_string()).unwrap_or_default(),
        sighting.emitter.as_str().to_string(),
        sighting.name.clone(),
        sighting.id.clone(),
        sighting.rssi.to_string(),
    ]
}

/// Writes rows using minimal quoting: a field is quoted only when it contains
/// a comma, a quote or a line break, and embedded quotes are doubled.
fn write_rows<'a, W: io::Write>(
    target: W,
    header: bool,
    rows: impl IntoIterator<Item = &'a Sighting>,
) -> io::Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(target);
    if header {
        writer.write_record(CSV_HEADER)?;
    }
    for sighting in rows {
        writer.write_record(csv_fields(sighting))?;
    }
    writer.flush()
}

/// Append-only CSV log bound to one run. The header is written exactly once
/// per underlying file.
pub struct CsvSink {
    base: PathBuf,
    path: PathBuf,
    generation: u32,
    header_written: bool,
    superseded: Vec<PathBuf>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let base = path.into();
        Self {
            path: base.clone(),
            base,
            generation: 0,
            superseded: Vec::new(),
            header_written: false,
        }
    }

    /// Creates (or truncates) the file and writes the header immediately.
    pub fn initialize(&mut self) -> io::Result<()> {
        write_rows(File::create(&self.path)?, true, std::iter::empty())?;
        self.header_written = true;
        Ok(())
    }

    pub fn append(&mut self, sighting: &Sighting) -> io::Result<()> {
        if !self.header_written {
            self.initialize()?;
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        write_rows(file, false, [sighting])
    }
}

impl SightingSink for CsvSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, latest: &Sighting, _history: &[Sighting]) -> io::Result<()> {
        self.append(latest)
    }

    fn recreate(&mut self) -> io::Result<()> {
        self.generation += 1;
        let next = generation_path(&self.base, self.generation);
        self.superseded.push(std::mem::replace(&mut self.path, next));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.header_written = false;
        Ok(())
    }

    fn superseded(&self) -> &[PathBuf] {
        &self.superseded
    }
}

/// Replaces the file at `path` with a header plus every sighting.
pub fn write_csv(path: &Path, sightings: &[Sighting]) -> SightResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    write_rows(File::create(path)?, true, sightings)?;
    Ok(())
}

/// Decodes one data row. Short rows are malformed; unparseable coordinates
/// become `None` and an unparseable rssi becomes 0.
pub fn parse_record(record: &StringRecord) -> SightResult<Sighting> {
    if record.len() < CSV_HEADER.len() {
        return Err(SightError::MalformedRecord(format!(
            "expected {} columns, found {}",
            CSV_HEADER.len(),
            record.len()
        )));
    }
    let emitter: EmitterType = record[3].trim().parse()?;
    Ok(Sighting {
        timestamp: record[0].to_string(),
        latitude: record[1].trim().parse().ok(),
        longitude: record[2].trim().parse().ok(),
        emitter,
        name: record[4].to_string(),
        id: record[5].to_string(),
        rssi: record[6].trim().parse().unwrap_or(0),
    })
}

/// Reads a run log back into sightings, skipping the header and malformed
/// rows. With `limit`, only the most recent `limit` rows are kept. A missing
/// file reads as empty.
pub fn read_sightings(path: &Path, limit: Option<usize>) -> SightResult<Vec<Sighting>> {
    let logger = LogManager::new("reader");
    if !path.exists() {
        logger.detail(&format!("{} does not exist; nothing to read", path.display()));
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        match result.map_err(SightError::from).and_then(|record| parse_record(&record)) {
            Ok(sighting) => rows.push(sighting),
            Err(err) => {
                skipped += 1;
                logger.detail(&format!("skipping row in {}: {}", path.display(), err));
            }
        }
    }
    if skipped > 0 {
        logger.degraded(&format!("skipped {} malformed rows in {}", skipped, path.display()));
    }

    if let Some(limit) = limit {
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
    }
    Ok(rows)
}
