//! Custom error types for dblpgraph.
//!
//! Row-level problems (bad years, short rows, failed annotations) never reach
//! this type; they are counted in a [`crate::report::StageReport`] and the row
//! is dropped. Everything here aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dblpgraph operations.
#[derive(Debug, Error)]
pub enum DblpGraphError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Graph store rejected a statement or the connection failed
    #[error("Graph error: {0}")]
    Graph(#[from] neo4rs::Error),

    /// Graph store answered with a row that could not be decoded
    #[error("Graph result error: {0}")]
    GraphResult(String),

    /// A projected column is not present in the export header
    #[error("Column '{column}' not found in {}", path.display())]
    MissingColumn {
        /// Export file that was read
        path: PathBuf,
        /// Column requested by the projection
        column: String,
    },

    /// Input export is absent
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Text annotation collaborator returned an unusable answer
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `DblpGraphError`
pub type Result<T> = std::result::Result<T, DblpGraphError>;

/// Extension trait for turning absent values into annotation errors
pub trait OptionExt<T> {
    /// Convert Option to Result with an annotation error message
    fn ok_or_annotation(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_annotation(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DblpGraphError::Annotation(msg.to_string()))
    }
}
