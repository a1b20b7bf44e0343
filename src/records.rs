//! Normalized intermediate tables.
//!
//! The Extractor writes and the Loader reads these files. They are
//! comma-delimited and carry **no header**: columns are addressed by
//! position, in the field order of the structs below. Reordering or
//! inserting a field is a breaking change for every table written by an
//! older build.
//!
//! | File | Columns |
//! |---|---|
//! | `minimized_proceedings.csv` | title, year |
//! | `minimized_journals.csv` | title, year, volume |
//! | `minimized_conference_papers.csv` | key, title, booktitle, year, abstract, keywords |
//! | `minimized_journal_papers.csv` | key, title, journal, year, volume, abstract, keywords |
//! | `minimized_{conference,journal}_keywords.csv` | key, keyword |
//! | `minimized_[non_]corresponding_{conference,journal}_authors.csv` | key, author, last_name, is_corresponding |
//! | `minimized_conference_venues.csv` | title, place |
//! | `minimized_affiliations.csv` | author, school |
//! | `minimized_reviews.csv` | key, reviewer, comment |

use crate::error::Result;
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const PROCEEDINGS_TABLE: &str = "minimized_proceedings.csv";
pub const JOURNALS_TABLE: &str = "minimized_journals.csv";
pub const CONFERENCE_PAPERS_TABLE: &str = "minimized_conference_papers.csv";
pub const JOURNAL_PAPERS_TABLE: &str = "minimized_journal_papers.csv";
pub const CONFERENCE_KEYWORDS_TABLE: &str = "minimized_conference_keywords.csv";
pub const JOURNAL_KEYWORDS_TABLE: &str = "minimized_journal_keywords.csv";
pub const CORRESPONDING_CONFERENCE_AUTHORS_TABLE: &str =
    "minimized_corresponding_conference_authors.csv";
pub const NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE: &str =
    "minimized_non_corresponding_conference_authors.csv";
pub const CORRESPONDING_JOURNAL_AUTHORS_TABLE: &str = "minimized_corresponding_journal_authors.csv";
pub const NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE: &str =
    "minimized_non_corresponding_journal_authors.csv";
pub const CONFERENCE_VENUES_TABLE: &str = "minimized_conference_venues.csv";
pub const AFFILIATIONS_TABLE: &str = "minimized_affiliations.csv";
pub const REVIEWS_TABLE: &str = "minimized_reviews.csv";

/// Separator used inside the `keywords` column
pub const KEYWORD_SEPARATOR: char = '|';

/// One conference edition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConferenceRow {
    pub title: String,
    pub year: i32,
}

/// One journal volume
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalRow {
    pub title: String,
    pub year: i32,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferencePaperRow {
    pub key: String,
    pub title: String,
    pub booktitle: String,
    pub year: i32,
    pub abstract_text: String,
    /// `|`-joined keyword list
    pub keywords: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalPaperRow {
    pub key: String,
    pub title: String,
    pub journal: String,
    pub year: i32,
    pub volume: String,
    pub abstract_text: String,
    /// `|`-joined keyword list
    pub keywords: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRow {
    pub key: String,
    pub keyword: String,
}

/// One (paper, author) attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorshipRow {
    pub key: String,
    pub author: String,
    pub last_name: String,
    pub is_corresponding: bool,
}

/// Place name attached to a conference title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueRow {
    pub title: String,
    pub place: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationRow {
    pub author: String,
    pub school: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub key: String,
    pub reviewer: String,
    pub comment: String,
}

/// Join a keyword list into the single-column representation.
pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(&KEYWORD_SEPARATOR.to_string())
}

/// Write rows as a headerless comma-delimited table.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Table written");
    Ok(())
}

/// Read a headerless table written by [`write_table`].
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    debug!(path = %path.display(), rows = rows.len(), "Table read");
    Ok(rows)
}
