use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use crate::drivers::AcquisitionError;
/// A user note pinned to a device timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub timestamp_ms: i64,
    pub message: String,
}
/// Timestamped notes for the running recording plus their chart markers.
///
/// Each note is appended to a sidecar file as `<timestamp>,<message>`. Markers
/// that scroll off the left edge of the chart are dropped from memory; the
/// file keeps everything.
#[derive(Debug, Default)]
pub struct AnnotationLog {
    path: Option<PathBuf>,
    markers: Vec<Marker>,
}
impl AnnotationLog {
    /// `None` keeps notes in memory only, e.g. before a recording file exists.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            markers: Vec::new(),
        }
    }
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
    /// Adds a marker and persists it. The marker stays on the chart even if the
    /// sidecar write fails.
    pub fn annotate(&mut self, timestamp_ms: i64, message: &str) -> Result<(), AcquisitionError> {
        let message = message.replace(['\r', '\n'], " ");
        self.markers.push(Marker {
            timestamp_ms,
            message: message.clone(),
        });
        let Some(path) = &self.path else {
            return Ok(());
        };
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "{timestamp_ms},{message}"))
            .map_err(AcquisitionError::PersistenceFailure)
    }
    /// Drops markers older than `left_edge`; returns how many went.
    pub fn prune_before(&mut self, left_edge: i64) -> usize {
        let before = self.markers.len();
        self.markers.retain(|m| m.timestamp_ms >= left_edge);
        before - self.markers.len()
    }
    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
/// Reads a sidecar file back. Messages may contain commas; only the first one
/// separates the timestamp.
pub fn read_annotations(path: &Path) -> Result<Vec<Marker>, AcquisitionError> {
    let reader = BufReader::new(File::open(path)?);
    let mut markers = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let Some((ts, msg)) = line.split_once(',') else {
            continue;
        };
        if let Ok(timestamp_ms) = ts.trim().parse() {
            markers.push(Marker {
                timestamp_ms,
                message: msg.to_owned(),
            });
        }
    }
    Ok(markers)
}
