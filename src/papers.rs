//! Paper selection and enrichment.
//!
//! Selection is last-write-wins: among rows sharing a DBLP key, the one with
//! the most recent `mdate` survives. Enrichment attaches a placeholder
//! abstract and a keyword list derived from the title.

use crate::annotate::{LoremKind, TextAnnotator, TextGenerator};
use crate::keywords::KeywordFrequency;
use crate::records::KeywordRow;
use crate::report::{Rejection, StageReport};
use crate::table::{coerce_year, Row};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A paper that survived key deduplication and null filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperDraft {
    pub key: String,
    pub title: String,
    /// `booktitle` for conference papers, `journal` for journal papers
    pub venue: String,
    pub year: i32,
    /// Always present for journal papers, always `None` for conference papers
    pub volume: Option<String>,
    pub mdate: Option<String>,
}

/// A paper with its abstract and keywords attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedPaper {
    pub draft: PaperDraft,
    pub abstract_text: String,
    pub keywords: Vec<String>,
}

/// Stable sort, most recent `mdate` first, rows without one last.
///
/// DBLP dates are ISO `YYYY-MM-DD`, so string order is date order.
pub fn sort_latest_first<T, F>(items: &mut [T], mdate: F)
where
    F: Fn(&T) -> Option<&str>,
{
    items.sort_by(|a, b| match (mdate(a), mdate(b)) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Turn projected export rows into one draft per key.
///
/// `rows` are `[key, title, venue, year, mdate]`, or
/// `[key, title, venue, year, volume, mdate]` when `with_volume` is set.
/// The most recently modified row per key wins, ties going to input order.
/// A winner with a null required field is dropped along with its key; an
/// older complete row never takes its place.
pub fn select_latest_papers(
    rows: Vec<Row>,
    with_volume: bool,
    report: &mut StageReport,
) -> Vec<PaperDraft> {
    let mut candidates: Vec<Candidate> = rows
        .into_iter()
        .filter_map(|row| {
            let candidate = Candidate::from_row(row, with_volume);
            if candidate.is_none() {
                report.reject(Rejection::Incomplete);
            }
            candidate
        })
        .collect();

    sort_latest_first(&mut candidates, |c| c.mdate.as_deref());

    let mut seen = HashSet::new();
    candidates.retain(|c| {
        let first = seen.insert(c.key.clone());
        if !first {
            report.reject(Rejection::Superseded);
        }
        first
    });

    candidates
        .into_iter()
        .filter_map(|c| {
            let draft = c.into_draft(with_volume);
            if draft.is_none() {
                report.reject(Rejection::Incomplete);
            }
            draft
        })
        .collect()
}

/// A projected row before null filtering. Only the key is required here.
struct Candidate {
    key: String,
    title: Option<String>,
    venue: Option<String>,
    year: Option<i32>,
    volume: Option<String>,
    mdate: Option<String>,
}

impl Candidate {
    fn from_row(row: Row, with_volume: bool) -> Option<Self> {
        let mut cells = row.into_iter();
        let key = cells.next().flatten()?;
        let title = cells.next().flatten();
        let venue = cells.next().flatten();
        let year = coerce_year(cells.next().flatten().as_deref());
        let volume = if with_volume {
            cells.next().flatten()
        } else {
            None
        };
        let mdate = cells.next().flatten();

        Some(Self {
            key,
            title,
            venue,
            year,
            volume,
            mdate,
        })
    }

    fn into_draft(self, with_volume: bool) -> Option<PaperDraft> {
        let volume = match (with_volume, self.volume) {
            (true, None) => return None,
            (true, volume) => volume,
            (false, _) => None,
        };

        Some(PaperDraft {
            key: self.key,
            title: self.title?,
            venue: self.venue?,
            year: self.year?,
            volume,
            mdate: self.mdate,
        })
    }
}

/// Attach abstracts and backfilled keywords to `drafts`.
///
/// Titles are tagged first so the frequency table covers the whole batch
/// before any title is backfilled. A failed tagging call counts as an
/// empty tag list.
pub async fn enrich_papers<G, R>(
    drafts: Vec<PaperDraft>,
    annotator: &dyn TextAnnotator,
    generator: &mut G,
    rng: &mut R,
    report: &mut StageReport,
) -> Vec<EnrichedPaper>
where
    G: TextGenerator + ?Sized,
    R: Rng + ?Sized,
{
    let mut frequency = KeywordFrequency::new();
    let mut tagged = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let tags = match annotator.tag_nouns(&draft.title).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(key = %draft.key, error = %e, "Keyword tagging failed");
                report.reject(Rejection::AnnotationFailed);
                Vec::new()
            }
        };
        frequency.observe(&tags);
        tagged.push((draft, tags));
    }

    if frequency.is_empty() && !tagged.is_empty() {
        warn!(papers = tagged.len(), "No title produced a keyword; nothing to backfill from");
    }
    debug!(
        papers = tagged.len(),
        pool = ?frequency.top(crate::keywords::BACKFILL_POOL),
        "Keyword frequencies collected"
    );

    tagged
        .into_iter()
        .map(|(draft, tags)| EnrichedPaper {
            abstract_text: generator.lorem(LoremKind::Paragraph),
            keywords: frequency.backfill(tags, rng),
            draft,
        })
        .collect()
}

/// One keyword row per (paper, keyword).
pub fn explode_keywords(papers: &[EnrichedPaper]) -> Vec<KeywordRow> {
    papers
        .iter()
        .flat_map(|p| {
            p.keywords.iter().map(|k| KeywordRow {
                key: p.draft.key.clone(),
                keyword: k.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{LexiconAnnotator, LoremGenerator};
    use crate::error::{DblpGraphError, Result};
    use crate::keywords::MIN_KEYWORDS;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn row(cells: &[Option<&str>]) -> Row {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_latest_mdate_wins() {
        let rows = vec![
            row(&[Some("k1"), Some("Old"), Some("ICSE"), Some("2019"), Some("2019-01-01")]),
            row(&[Some("k1"), Some("New"), Some("ICSE"), Some("2019"), Some("2020-06-01")]),
            row(&[Some("k1"), Some("Undated"), Some("ICSE"), Some("2019"), None]),
            row(&[Some("k2"), Some("Other"), Some("ICSE"), Some("2019.0"), None]),
        ];
        let mut report = StageReport::new("papers");
        let drafts = select_latest_papers(rows, false, &mut report);

        assert_eq!(drafts.len(), 2);
        let k1 = drafts.iter().find(|d| d.key == "k1").map(|d| d.title.as_str());
        assert_eq!(k1, Some("New"));
        assert_eq!(report.rejected_for(Rejection::Superseded), 2);
    }

    #[test]
    fn test_null_mdate_ties_keep_input_order() {
        let rows = vec![
            row(&[Some("k1"), Some("First"), Some("TSE"), Some("2019"), Some("45"), None]),
            row(&[Some("k1"), Some("Second"), Some("TSE"), Some("2019"), Some("45"), None]),
        ];
        let mut report = StageReport::new("papers");
        let drafts = select_latest_papers(rows, true, &mut report);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "First");
        assert_eq!(drafts[0].volume.as_deref(), Some("45"));
    }

    #[test]
    fn test_incomplete_rows_dropped() {
        let rows = vec![
            row(&[Some("k1"), None, Some("ICSE"), Some("2019"), None]),
            row(&[Some("k2"), Some("T"), Some("ICSE"), Some("soon"), None]),
            row(&[Some("k3"), Some("T"), Some("TSE"), Some("2019"), None, None]),
        ];
        let mut report = StageReport::new("papers");
        assert!(select_latest_papers(rows[..2].to_vec(), false, &mut report).is_empty());
        assert!(select_latest_papers(rows[2..].to_vec(), true, &mut report).is_empty());
        assert_eq!(report.rejected_for(Rejection::Incomplete), 3);
    }

    #[test]
    fn test_incomplete_latest_row_is_not_replaced() {
        let rows = vec![
            row(&[Some("k1"), Some("Stale"), Some("ICSE"), Some("2019"), Some("2019-01-01")]),
            row(&[Some("k1"), Some("Latest"), None, Some("2019"), Some("2021-01-01")]),
            row(&[Some("k2"), Some("Kept"), Some("ICSE"), Some("2019"), Some("2018-01-01")]),
        ];
        let mut report = StageReport::new("papers");
        let drafts = select_latest_papers(rows, false, &mut report);

        let keys: Vec<&str> = drafts.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["k2"]);
        assert_eq!(report.rejected_for(Rejection::Superseded), 1);
        assert_eq!(report.rejected_for(Rejection::Incomplete), 1);
    }

    #[test]
    fn test_missing_volume_on_latest_journal_row() {
        let rows = vec![
            row(&[Some("k1"), Some("Old"), Some("TSE"), Some("2019"), Some("45"), Some("2019-01-01")]),
            row(&[Some("k1"), Some("New"), Some("TSE"), Some("2019"), None, Some("2020-01-01")]),
        ];
        let mut report = StageReport::new("papers");
        assert!(select_latest_papers(rows, true, &mut report).is_empty());
        assert_eq!(report.rejected_for(Rejection::Incomplete), 1);
    }

    struct FailingAnnotator;

    #[async_trait]
    impl TextAnnotator for FailingAnnotator {
        async fn tag_nouns(&self, _text: &str) -> Result<Vec<String>> {
            Err(DblpGraphError::Annotation("offline".to_string()))
        }

        async fn extract_place_names(&self, _text: &str) -> Result<Vec<String>> {
            Err(DblpGraphError::Annotation("offline".to_string()))
        }
    }

    fn draft(key: &str, title: &str) -> PaperDraft {
        PaperDraft {
            key: key.to_string(),
            title: title.to_string(),
            venue: "ICSE".to_string(),
            year: 2019,
            volume: None,
            mdate: None,
        }
    }

    async fn enrich_with_seed(drafts: Vec<PaperDraft>) -> Vec<EnrichedPaper> {
        let mut generator = LoremGenerator::new(StdRng::seed_from_u64(1));
        let mut rng = StdRng::seed_from_u64(2);
        let mut report = StageReport::new("papers");
        let annotator = LexiconAnnotator::new();
        enrich_papers(drafts, &annotator, &mut generator, &mut rng, &mut report).await
    }

    #[tokio::test]
    async fn test_enrichment_is_seeded() {
        let drafts = vec![
            draft("k1", "Graph Query Optimization for Property Graph Databases"),
            draft("k2", "Graph Neural Networks"),
            draft("k3", "On It"),
        ];

        let first = enrich_with_seed(drafts.clone()).await;
        let second = enrich_with_seed(drafts).await;
        assert_eq!(first, second);
        assert!(first.iter().all(|p| !p.abstract_text.is_empty()));
        assert_eq!(
            first[0].keywords,
            vec!["graph", "query", "optimization", "property", "databases"]
        );
        assert!(first.iter().all(|p| p.keywords.len() == MIN_KEYWORDS));
        assert_eq!(&first[1].keywords[..3], &["graph", "neural", "networks"]);
        assert_eq!(explode_keywords(&first).len(), 3 * MIN_KEYWORDS);
    }

    #[tokio::test]
    async fn test_tagging_failure_counts_and_continues() {
        let mut generator = LoremGenerator::new(StdRng::seed_from_u64(1));
        let mut rng = StdRng::seed_from_u64(2);
        let mut report = StageReport::new("papers");
        let papers = enrich_papers(
            vec![draft("k1", "Anything")],
            &FailingAnnotator,
            &mut generator,
            &mut rng,
            &mut report,
        )
        .await;

        assert_eq!(papers.len(), 1);
        assert!(papers[0].keywords.is_empty());
        assert_eq!(report.rejected_for(Rejection::AnnotationFailed), 1);
    }
}
