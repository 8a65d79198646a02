use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::prelude::{SightResult, Sighting};
use crate::store::sink::{generation_path, SightingSink};

pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders a KML 2.2 document with one placemark per located sighting.
pub fn render_kml(document_name: &str, sightings: &[Sighting]) -> String {
    let mut body = String::new();
    body.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    body.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n");
    body.push_str("  <Document>\n");
    let _ = writeln!(body, "    <name>{}</name>", escape_xml(document_name));
    for sighting in sightings {
        let Some(location) = sighting.location() else {
            continue;
        };
        let name = escape_xml(&format!(
            "{}: {} ({} dBm)",
            sighting.emitter, sighting.name, sighting.rssi
        ));
        let description = escape_xml(&format!("{} | ID: {}", sighting.timestamp, sighting.id));
        body.push_str("    <Placemark>\n");
        let _ = writeln!(body, "      <name>{}</name>", name);
        let _ = writeln!(body, "      <description>{}</description>", description);
        let _ = writeln!(
            body,
            "      <Point><coordinates>{},{},0</coordinates></Point>",
            location.longitude, location.latitude
        );
        body.push_str("    </Placemark>\n");
    }
    body.push_str("  </Document>\n");
    body.push_str("</kml>\n");
    body
}

pub fn write_kml(path: &Path, document_name: &str, sightings: &[Sighting]) -> SightResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_kml(document_name, sightings))?;
    Ok(())
}

/// KML log regenerated in full from the run history on every write, so the
/// file on disk is always a closed, valid document.
pub struct KmlSink {
    base: PathBuf,
    path: PathBuf,
    generation: u32,
    document_name: String,
    superseded: Vec<PathBuf>,
}

impl KmlSink {
    pub fn new(path: impl Into<PathBuf>, document_name: impl Into<String>) -> Self {
        let base = path.into();
        Self {
            path: base.clone(),
            base,
            generation: 0,
            superseded: Vec::new(),
            document_name: document_name.into(),
        }
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }
}

impl SightingSink for KmlSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, _latest: &Sighting, history: &[Sighting]) -> io::Result<()> {
        fs::write(&self.path, render_kml(&self.document_name, history))
    }

    fn recreate(&mut self) -> io::Result<()> {
        self.generation += 1;
        let next = generation_path(&self.base, self.generation);
        self.superseded.push(std::mem::replace(&mut self.path, next));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn superseded(&self) -> &[PathBuf] {
        &self.superseded
    }
}
