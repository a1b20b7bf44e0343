//! Raw export reader.
//!
//! DBLP exports are semicolon-delimited with a header row. Reading is capped
//! at a fixed number of data rows, so a run always works on a bounded
//! snapshot of the file. Cells are kept as `Option<String>`: empty cells,
//! padded short rows and failed coercions all end up as `None` and are
//! filtered by the per-entity null checks.

use crate::error::{DblpGraphError, Result};
use crate::report::{Rejection, StageReport};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field delimiter of the raw exports
pub const EXPORT_DELIMITER: u8 = b';';

/// One projected row: cells in the order requested by [`RawTable::select`]
pub type Row = Vec<Option<String>>;

/// A row-capped, header-addressed view of one raw export file
#[derive(Debug, Clone)]
pub struct RawTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Row>,
    dropped_columns: Vec<String>,
    malformed: usize,
}

impl RawTable {
    /// Read at most `max_rows` data rows from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or its header cannot be read. Individual
    /// bad rows never fail the read; they are counted as malformed.
    pub fn read(path: &Path, max_rows: usize) -> Result<Self> {
        if !path.exists() {
            return Err(DblpGraphError::MissingInput(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, path, max_rows)
    }

    /// Parse an export from any reader. `path` is only used for messages.
    pub fn from_reader<R: Read>(source: R, path: &Path, max_rows: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(EXPORT_DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        let mut malformed = 0;

        for record in reader.records().take(max_rows) {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping undecodable row");
                    malformed += 1;
                    continue;
                }
            };

            if record.len() > headers.len() {
                malformed += 1;
                continue;
            }

            let mut row: Row = record.iter().map(clean_cell).collect();
            row.resize(headers.len(), None);
            rows.push(row);
        }

        if malformed > 0 {
            warn!(path = %path.display(), malformed, "Skipped malformed rows");
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
            dropped_columns: Vec::new(),
            malformed,
        })
    }

    /// Number of data rows kept after reading
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no data rows were read
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows skipped while reading (too many fields, bad encoding)
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Current column names
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Remove every column that has no value in any row.
    pub fn drop_empty_columns(&mut self) {
        let keep: Vec<bool> = (0..self.headers.len())
            .map(|i| self.rows.iter().any(|row| row[i].is_some()))
            .collect();

        if keep.iter().all(|k| *k) {
            return;
        }

        for (i, header) in self.headers.iter().enumerate() {
            if !keep[i] {
                self.dropped_columns.push(header.clone());
            }
        }
        debug!(path = %self.path.display(), dropped = ?self.dropped_columns, "Dropped empty columns");

        self.headers = retain_by_mask(std::mem::take(&mut self.headers), &keep);
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| retain_by_mask(row, &keep))
            .collect();
    }

    /// Project every row down to `columns`, in that order.
    ///
    /// A column removed by [`Self::drop_empty_columns`] projects as nulls.
    ///
    /// # Errors
    ///
    /// Returns [`DblpGraphError::MissingColumn`] if a column never appeared
    /// in the header.
    pub fn select(&self, columns: &[&str]) -> Result<Vec<Row>> {
        let mut indices = Vec::with_capacity(columns.len());
        for column in columns {
            match self.headers.iter().position(|h| h == column) {
                Some(i) => indices.push(Some(i)),
                None if self.dropped_columns.iter().any(|d| d == column) => indices.push(None),
                None => {
                    return Err(DblpGraphError::MissingColumn {
                        path: self.path.clone(),
                        column: column.to_string(),
                    })
                }
            }
        }

        Ok(self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row[i].clone()))
                    .collect()
            })
            .collect())
    }

    /// Record the read-level counters of this table into a stage report.
    pub fn record_into(&self, report: &mut StageReport) {
        report.rows_read += self.rows.len() + self.malformed;
        report.reject_n(Rejection::Malformed, self.malformed);
    }
}

fn clean_cell(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}

/// Coerce a year cell to an integer.
///
/// Accepts `"2019"` and float renderings such as `"2019.0"`; anything else
/// (including fractional years) becomes `None`.
pub fn coerce_year(cell: Option<&str>) -> Option<i32> {
    let text = cell?.trim();
    if let Ok(year) = text.parse::<i32>() {
        return Some(year);
    }
    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < f64::from(i32::MAX) {
        Some(value as i32)
    } else {
        None
    }
}
