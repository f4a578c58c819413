//! Artifact output.
//!
//! The pipeline only needs "write these bytes under this name"; where the
//! bytes land is up to the [`ArtifactSink`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::Envelope;
use crate::content::Report;
use crate::envelope;

/// Errors that can occur during report generation and output.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown report format '{0}' (expected text, html, markdown or json)")]
    UnknownEnvelope(String),
}

/// Destination for named artifacts.
pub trait ArtifactSink: Send + Sync {
    /// Stores `bytes` under `name` and returns where they went.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ReporterError>;
}

/// Writes artifacts into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for FsSink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ReporterError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Keeps artifacts in memory. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    pub fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ReporterError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(PathBuf::from(name))
    }
}

/// Artifact name for a run and envelope: `<id>.<ext>`.
pub fn artifact_name(id: &str, envelope: Envelope) -> String {
    format!("{id}.{}", envelope.extension())
}

/// Renders reports through envelopes and hands them to a sink.
pub struct ReportWriter {
    sink: Arc<dyn ArtifactSink>,
}

impl ReportWriter {
    pub fn new(sink: Arc<dyn ArtifactSink>) -> Self {
        Self { sink }
    }

    /// Filesystem writer rooted at `dir`.
    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsSink::new(dir)))
    }

    /// Writes one artifact per envelope, in the order given.
    pub fn write(
        &self,
        report: &Report,
        envelopes: &[Envelope],
    ) -> Result<Vec<PathBuf>, ReporterError> {
        let mut written = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let content = envelope::render(report, *envelope)?;
            let path = self
                .sink
                .write(&artifact_name(&report.id, *envelope), content.as_bytes())?;
            info!(path = %path.display(), format = %envelope, "report written");
            written.push(path);
        }
        Ok(written)
    }

    /// Writes any serializable value as pretty JSON under `name`.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, ReporterError> {
        let json = serde_json::to_string_pretty(value)?;
        self.sink.write(name, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ReportGenerator;
    use probe_proto::PhaseLog;
    use tempfile::TempDir;

    #[test]
    fn test_fs_sink_creates_directory() {
        let temp = TempDir::new().unwrap();
        let sink = FsSink::new(temp.path().join("nested/reports"));
        let path = sink.write("a.txt", b"hello").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_writer_names_by_run_id() {
        let temp = TempDir::new().unwrap();
        let writer = ReportWriter::to_dir(temp.path());
        let report = ReportGenerator::default().generate(None, None, &PhaseLog::new());

        let paths = writer
            .write(&report, &[Envelope::Text, Envelope::Json, Envelope::Markdown])
            .unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["unknown-run.txt", "unknown-run.json", "unknown-run.md"]
        );
    }

    #[test]
    fn test_memory_sink() {
        let sink = Arc::new(MemorySink::new());
        let writer = ReportWriter::new(sink.clone());
        writer.write_json("plan.json", &vec![1, 2, 3]).unwrap();
        assert_eq!(sink.names(), vec!["plan.json"]);
        assert!(sink.get_string("plan.json").unwrap().contains('2'));
    }
}
