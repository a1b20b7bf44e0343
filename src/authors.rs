//! Author attribution explosion and corresponding-author partitioning.

use crate::normalize::{family_name, is_corresponding, strip_digits};
use crate::records::AuthorshipRow;
use crate::report::{Rejection, StageReport};
use crate::table::Row;
use std::collections::HashSet;

/// Separator between names in the export's `author` column
pub const AUTHOR_SEPARATOR: char = '|';

/// Attributions split by the corresponding-author flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorPartition {
    /// At most one row per paper key, flag always true
    pub corresponding: Vec<AuthorshipRow>,
    /// Every other attribution, one row per (key, author), flag always false
    pub non_corresponding: Vec<AuthorshipRow>,
}

/// Explode `[author, key]` rows into one attribution per listed name.
///
/// Rows with a null cell and exact duplicates are dropped before splitting.
/// Names are digit-stripped; names that end up empty are dropped.
pub fn explode_authors(rows: Vec<Row>, report: &mut StageReport) -> Vec<AuthorshipRow> {
    let mut seen = HashSet::new();
    let mut exploded = Vec::new();

    for row in rows {
        let mut cells = row.into_iter();
        let (Some(authors), Some(key)) = (cells.next().flatten(), cells.next().flatten()) else {
            report.reject(Rejection::Incomplete);
            continue;
        };

        if !seen.insert((authors.clone(), key.clone())) {
            report.reject(Rejection::Duplicate);
            continue;
        }

        for raw in authors.split(AUTHOR_SEPARATOR) {
            let author = strip_digits(raw);
            if author.is_empty() {
                report.reject(Rejection::EmptyName);
                continue;
            }
            let last_name = family_name(&author);
            let is_corresponding = is_corresponding(&last_name, &key);
            exploded.push(AuthorshipRow {
                key: key.clone(),
                author,
                last_name,
                is_corresponding,
            });
        }
    }

    exploded
}

/// Split attributions into the corresponding and non-corresponding tables.
///
/// The first flagged attribution of a key becomes its corresponding author.
/// Later flagged attributions of the same key are demoted to
/// non-corresponding with the flag cleared.
pub fn partition_authors(rows: Vec<AuthorshipRow>) -> AuthorPartition {
    let mut chosen_keys = HashSet::new();
    let mut chosen_pairs = HashSet::new();
    let mut partition = AuthorPartition::default();

    for row in &rows {
        if row.is_corresponding && chosen_keys.insert(row.key.clone()) {
            chosen_pairs.insert((row.key.clone(), row.author.clone()));
            partition.corresponding.push(row.clone());
        }
    }

    let mut seen = HashSet::new();
    for mut row in rows {
        let pair = (row.key.clone(), row.author.clone());
        if chosen_pairs.contains(&pair) || !seen.insert(pair) {
            continue;
        }
        row.is_corresponding = false;
        partition.non_corresponding.push(row);
    }

    partition
}

/// Distinct author names across `tables`, sorted.
pub fn distinct_authors<'a, I>(tables: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [AuthorshipRow]>,
{
    let mut names: Vec<String> = tables
        .into_iter()
        .flatten()
        .map(|r| r.author.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    names.sort();
    names
}
