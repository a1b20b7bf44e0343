//! Per-stage accounting and the run manifest.
//!
//! Every extraction stage counts what it read, what it wrote and why rows
//! were rejected; the loader counts what it upserted and which references
//! did not match. Both end up in `manifest.json` next to the normalized
//! tables.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the run manifest inside the work directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Why a row did not make it into an output table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rejection {
    /// Wrong field count or undecodable bytes in the export
    Malformed,
    /// A required field was null after parsing
    Incomplete,
    /// Exact duplicate of an earlier row
    Duplicate,
    /// Lost last-write-wins against a more recent row with the same key
    Superseded,
    /// Author name was empty after cleaning
    EmptyName,
    /// Place extraction found nothing
    NoPlace,
    /// Text annotation collaborator failed for this row
    AnnotationFailed,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::Incomplete => "incomplete",
            Rejection::Duplicate => "duplicate",
            Rejection::Superseded => "superseded",
            Rejection::EmptyName => "empty_name",
            Rejection::NoPlace => "no_place",
            Rejection::AnnotationFailed => "annotation_failed",
        }
    }
}

/// Counters for one extraction stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    /// Output table (or entity) this stage produced
    pub entity: String,
    pub rows_read: usize,
    pub rows_written: usize,
    /// Rejection reason -> row count
    pub rejected: BTreeMap<&'static str, usize>,
}

impl StageReport {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            ..Default::default()
        }
    }

    pub fn reject(&mut self, reason: Rejection) {
        self.reject_n(reason, 1);
    }

    pub fn reject_n(&mut self, reason: Rejection, count: usize) {
        if count > 0 {
            *self.rejected.entry(reason.as_str()).or_insert(0) += count;
        }
    }

    /// Rows rejected for `reason`
    pub fn rejected_for(&self, reason: Rejection) -> usize {
        self.rejected.get(reason.as_str()).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Emit the counters as one structured log line.
    pub fn log(&self) {
        if self.total_rejected() > 0 {
            warn!(
                entity = %self.entity,
                read = self.rows_read,
                written = self.rows_written,
                rejected = ?self.rejected,
                "Stage finished with rejections"
            );
        } else {
            info!(
                entity = %self.entity,
                read = self.rows_read,
                written = self.rows_written,
                "Stage finished"
            );
        }
    }
}

/// Counters for one load
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Label -> nodes removed before reload
    pub purged: BTreeMap<&'static str, usize>,
    /// Label -> node upserts issued
    pub nodes: BTreeMap<&'static str, usize>,
    /// Relationship type -> relationships merged
    pub relationships: BTreeMap<&'static str, usize>,
    /// Table -> rows whose match target was not in the store
    pub unmatched: BTreeMap<String, usize>,
}

impl LoadReport {
    pub fn add_nodes(&mut self, label: &'static str, count: usize) {
        *self.nodes.entry(label).or_insert(0) += count;
    }

    pub fn add_relationships(&mut self, rel: &'static str, count: usize) {
        *self.relationships.entry(rel).or_insert(0) += count;
    }

    pub fn add_unmatched(&mut self, table: &str, count: usize) {
        if count > 0 {
            *self.unmatched.entry(table.to_string()).or_insert(0) += count;
        }
    }

    pub fn total_unmatched(&self) -> usize {
        self.unmatched.values().sum()
    }
}

/// Everything a run did, written as `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub max_rows: usize,
    pub extract: Vec<StageReport>,
    pub load: Option<LoadReport>,
}

impl RunManifest {
    pub fn new(seed: u64, max_rows: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            seed,
            max_rows,
            extract: Vec::new(),
            load: None,
        }
    }

    /// Write the manifest into `dir` and return its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        info!(path = %path.display(), "Run manifest written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reject_counts() {
        let mut report = StageReport::new("papers");
        report.reject(Rejection::Incomplete);
        report.reject_n(Rejection::Incomplete, 2);
        report.reject_n(Rejection::Duplicate, 0);
        assert_eq!(report.rejected_for(Rejection::Incomplete), 3);
        assert!(!report.rejected.contains_key("duplicate"));
        assert_eq!(report.total_rejected(), 3);
    }

    #[test]
    fn test_manifest_written() -> Result<()> {
        let dir = TempDir::new()?;
        let mut manifest = RunManifest::new(7, 100);
        manifest.extract.push(StageReport::new("conferences"));
        let path = manifest.write(dir.path())?;

        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        assert_eq!(value["seed"], 7);
        assert_eq!(value["extract"][0]["entity"], "conferences");
        Ok(())
    }
}
