//! Extraction Stage
//!
//! Reads the raw DBLP exports and writes the normalized tables listed in
//! [`crate::records`]. Each operation reads a capped snapshot, drops empty
//! columns, projects the fields it needs, filters and deduplicates, and
//! returns a [`StageReport`] with what it kept and why it dropped the rest.
//!
//! Later stages read the tables written by earlier ones, so the operations
//! can also be rerun one at a time.

use crate::annotate::{LoremGenerator, TextAnnotator};
use crate::authors::{distinct_authors, explode_authors, partition_authors};
use crate::config::{PipelineConfig, Stage};
use crate::error::Result;
use crate::papers::{enrich_papers, explode_keywords, select_latest_papers, sort_latest_first};
use crate::records::*;
use crate::report::{Rejection, StageReport};
use crate::synthetic::{synthesize_affiliations, synthesize_reviews};
use crate::table::{coerce_year, RawTable, Row};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Raw export of conference papers
pub const INPROCEEDINGS_EXPORT: &str = "output_inproceedings.csv";

/// Raw export of journal articles
pub const ARTICLE_EXPORT: &str = "output_article.csv";

/// Runs the extraction operations against one configuration
pub struct Extractor<'a> {
    config: &'a PipelineConfig,
    annotator: &'a dyn TextAnnotator,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a PipelineConfig, annotator: &'a dyn TextAnnotator) -> Self {
        Self { config, annotator }
    }

    /// Run every operation in dependency order.
    pub async fn run(&self) -> Result<Vec<StageReport>> {
        std::fs::create_dir_all(&self.config.work_dir)?;
        info!(
            input = %self.config.input_dir.display(),
            output = %self.config.work_dir.display(),
            max_rows = self.config.max_rows,
            seed = self.config.seed,
            "Starting extraction"
        );

        let mut reports = vec![self.extract_conferences()?, self.extract_journals()?];
        reports.extend(self.extract_conference_papers().await?);
        reports.extend(self.extract_journal_papers().await?);
        reports.push(self.extract_conference_venues().await?);
        reports.push(self.extract_conference_authors()?);
        reports.push(self.extract_journal_authors()?);
        reports.extend(self.synthesize()?);

        let written: usize = reports.iter().map(|r| r.rows_written).sum();
        let rejected: usize = reports.iter().map(|r| r.total_rejected()).sum();
        info!(stages = reports.len(), written, rejected, "Extraction complete");
        Ok(reports)
    }

    fn read_export(&self, name: &str) -> Result<RawTable> {
        let mut table = RawTable::read(&self.config.input(name), self.config.max_rows)?;
        table.drop_empty_columns();
        if table.is_empty() {
            warn!(export = name, "Export has no data rows");
        }
        debug!(export = name, rows = table.len(), columns = ?table.headers(), "Export read");
        Ok(table)
    }

    /// Distinct (booktitle, year) conference editions.
    pub fn extract_conferences(&self) -> Result<StageReport> {
        let mut report = StageReport::new("conferences");
        let table = self.read_export(INPROCEEDINGS_EXPORT)?;
        table.record_into(&mut report);

        let rows = normalize_conferences(table.select(&["booktitle", "year"])?, &mut report);
        self.write(PROCEEDINGS_TABLE, &rows, &mut report)?;
        Ok(report)
    }

    /// Distinct (journal, year, volume) triples, most recent row first.
    pub fn extract_journals(&self) -> Result<StageReport> {
        let mut report = StageReport::new("journals");
        let table = self.read_export(ARTICLE_EXPORT)?;
        table.record_into(&mut report);

        let rows = normalize_journals(
            table.select(&["journal", "year", "volume", "mdate"])?,
            &mut report,
        );
        self.write(JOURNALS_TABLE, &rows, &mut report)?;
        Ok(report)
    }

    /// Conference papers plus their keyword table.
    pub async fn extract_conference_papers(&self) -> Result<Vec<StageReport>> {
        let mut report = StageReport::new("conference_papers");
        let table = self.read_export(INPROCEEDINGS_EXPORT)?;
        table.record_into(&mut report);

        let drafts = select_latest_papers(
            table.select(&["key", "title", "booktitle", "year", "mdate"])?,
            false,
            &mut report,
        );

        let mut generator = LoremGenerator::new(self.config.rng(Stage::ConferenceAbstracts));
        let mut rng = self.config.rng(Stage::ConferenceKeywords);
        let papers =
            enrich_papers(drafts, self.annotator, &mut generator, &mut rng, &mut report).await;

        let rows: Vec<ConferencePaperRow> = papers
            .iter()
            .map(|p| ConferencePaperRow {
                key: p.draft.key.clone(),
                title: p.draft.title.clone(),
                booktitle: p.draft.venue.clone(),
                year: p.draft.year,
                abstract_text: p.abstract_text.clone(),
                keywords: join_keywords(&p.keywords),
            })
            .collect();
        self.write(CONFERENCE_PAPERS_TABLE, &rows, &mut report)?;

        let mut keyword_report = StageReport::new("conference_keywords");
        keyword_report.rows_read = papers.len();
        self.write(CONFERENCE_KEYWORDS_TABLE, &explode_keywords(&papers), &mut keyword_report)?;

        Ok(vec![report, keyword_report])
    }

    /// Journal papers plus their keyword table.
    pub async fn extract_journal_papers(&self) -> Result<Vec<StageReport>> {
        let mut report = StageReport::new("journal_papers");
        let table = self.read_export(ARTICLE_EXPORT)?;
        table.record_into(&mut report);

        let drafts = select_latest_papers(
            table.select(&["key", "title", "journal", "year", "volume", "mdate"])?,
            true,
            &mut report,
        );

        let mut generator = LoremGenerator::new(self.config.rng(Stage::JournalAbstracts));
        let mut rng = self.config.rng(Stage::JournalKeywords);
        let papers =
            enrich_papers(drafts, self.annotator, &mut generator, &mut rng, &mut report).await;

        let rows: Vec<JournalPaperRow> = papers
            .iter()
            .map(|p| JournalPaperRow {
                key: p.draft.key.clone(),
                title: p.draft.title.clone(),
                journal: p.draft.venue.clone(),
                year: p.draft.year,
                volume: p.draft.volume.clone().unwrap_or_default(),
                abstract_text: p.abstract_text.clone(),
                keywords: join_keywords(&p.keywords),
            })
            .collect();
        self.write(JOURNAL_PAPERS_TABLE, &rows, &mut report)?;

        let mut keyword_report = StageReport::new("journal_keywords");
        keyword_report.rows_read = papers.len();
        self.write(JOURNAL_KEYWORDS_TABLE, &explode_keywords(&papers), &mut keyword_report)?;

        Ok(vec![report, keyword_report])
    }

    /// One place name per conference title, taken from a representative
    /// paper title. Reads the normalized conference papers table.
    pub async fn extract_conference_venues(&self) -> Result<StageReport> {
        let mut report = StageReport::new("conference_venues");
        let papers: Vec<ConferencePaperRow> =
            read_table(&self.config.table(CONFERENCE_PAPERS_TABLE))?;

        let representatives = representative_titles(&papers);
        report.rows_read = representatives.len();

        let mut rows = Vec::new();
        for (booktitle, title) in representatives {
            match self.annotator.extract_place_names(title).await {
                Ok(places) => match places.into_iter().next() {
                    Some(place) => rows.push(VenueRow {
                        title: booktitle.to_string(),
                        place,
                    }),
                    None => report.reject(Rejection::NoPlace),
                },
                Err(e) => {
                    warn!(conference = booktitle, error = %e, "Place extraction failed");
                    report.reject(Rejection::AnnotationFailed);
                }
            }
        }

        self.write(CONFERENCE_VENUES_TABLE, &rows, &mut report)?;
        Ok(report)
    }

    /// Conference authorships, split by corresponding flag.
    pub fn extract_conference_authors(&self) -> Result<StageReport> {
        self.extract_authors(
            "conference_authors",
            INPROCEEDINGS_EXPORT,
            CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
            NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
        )
    }

    /// Journal authorships, split by corresponding flag.
    pub fn extract_journal_authors(&self) -> Result<StageReport> {
        self.extract_authors(
            "journal_authors",
            ARTICLE_EXPORT,
            CORRESPONDING_JOURNAL_AUTHORS_TABLE,
            NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE,
        )
    }

    fn extract_authors(
        &self,
        entity: &str,
        export: &str,
        corresponding_table: &str,
        non_corresponding_table: &str,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(entity);
        let table = self.read_export(export)?;
        table.record_into(&mut report);

        let attributions = explode_authors(table.select(&["author", "key"])?, &mut report);
        let partition = partition_authors(attributions);

        self.write(corresponding_table, &partition.corresponding, &mut report)?;
        self.write(non_corresponding_table, &partition.non_corresponding, &mut report)?;
        Ok(report)
    }

    /// School affiliations and reviews, from the tables already written.
    pub fn synthesize(&self) -> Result<Vec<StageReport>> {
        let tables = [
            CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
            NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
            CORRESPONDING_JOURNAL_AUTHORS_TABLE,
            NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE,
        ];
        let attributions = tables
            .iter()
            .map(|name| read_table::<AuthorshipRow>(&self.config.table(name)))
            .collect::<Result<Vec<_>>>()?;
        let slices: Vec<&[AuthorshipRow]> = attributions.iter().map(Vec::as_slice).collect();
        let authors = distinct_authors(slices.iter().copied());

        let mut affiliation_report = StageReport::new("affiliations");
        affiliation_report.rows_read = authors.len();
        let affiliations =
            synthesize_affiliations(&authors, &mut self.config.rng(Stage::Affiliations));
        self.write(AFFILIATIONS_TABLE, &affiliations, &mut affiliation_report)?;

        let conference: Vec<ConferencePaperRow> =
            read_table(&self.config.table(CONFERENCE_PAPERS_TABLE))?;
        let journal: Vec<JournalPaperRow> = read_table(&self.config.table(JOURNAL_PAPERS_TABLE))?;
        let mut review_report = StageReport::new("reviews");
        let mut seen = HashSet::new();
        let keys: Vec<String> = conference
            .into_iter()
            .map(|p| p.key)
            .chain(journal.into_iter().map(|p| p.key))
            .filter(|key| {
                review_report.rows_read += 1;
                let first = seen.insert(key.clone());
                if !first {
                    review_report.reject(Rejection::Duplicate);
                }
                first
            })
            .collect();
        let mut generator = LoremGenerator::new(self.config.rng(Stage::ReviewComments));
        let reviews = synthesize_reviews(
            &keys,
            &slices,
            &authors,
            self.config.reviewers_per_paper,
            &mut self.config.rng(Stage::Reviews),
            &mut generator,
        );
        self.write(REVIEWS_TABLE, &reviews, &mut review_report)?;

        Ok(vec![affiliation_report, review_report])
    }

    fn write<T: serde::Serialize>(
        &self,
        name: &str,
        rows: &[T],
        report: &mut StageReport,
    ) -> Result<()> {
        write_table(&self.config.table(name), rows)?;
        report.rows_written += rows.len();
        info!(table = name, rows = rows.len(), "Table extracted");
        Ok(())
    }
}

/// `[booktitle, year]` rows to distinct conference editions, first
/// occurrence order.
pub fn normalize_conferences(rows: Vec<Row>, report: &mut StageReport) -> Vec<ConferenceRow> {
    let mut seen = HashSet::new();
    let mut conferences = Vec::new();

    for row in rows {
        let mut cells = row.into_iter();
        let title = cells.next().flatten();
        let year = coerce_year(cells.next().flatten().as_deref());
        let (Some(title), Some(year)) = (title, year) else {
            report.reject(Rejection::Incomplete);
            continue;
        };

        let conference = ConferenceRow { title, year };
        if seen.insert(conference.clone()) {
            conferences.push(conference);
        } else {
            report.reject(Rejection::Duplicate);
        }
    }
    conferences
}

/// `[journal, year, volume, mdate]` rows to distinct journal volumes,
/// keeping the most recently modified row of each.
pub fn normalize_journals(rows: Vec<Row>, report: &mut StageReport) -> Vec<JournalRow> {
    let mut dated: Vec<(JournalRow, Option<String>)> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = row.into_iter();
        let title = cells.next().flatten();
        let year = coerce_year(cells.next().flatten().as_deref());
        let volume = cells.next().flatten();
        let mdate = cells.next().flatten();
        match (title, year, volume) {
            (Some(title), Some(year), Some(volume)) => {
                dated.push((JournalRow { title, year, volume }, mdate))
            }
            _ => report.reject(Rejection::Incomplete),
        }
    }

    sort_latest_first(&mut dated, |(_, mdate)| mdate.as_deref());

    let mut seen = HashSet::new();
    let mut journals = Vec::new();
    for (journal, _) in dated {
        if seen.insert(journal.clone()) {
            journals.push(journal);
        } else {
            report.reject(Rejection::Superseded);
        }
    }
    journals
}

/// First paper title for each distinct booktitle, in first-seen order.
pub fn representative_titles(papers: &[ConferencePaperRow]) -> Vec<(&str, &str)> {
    let mut seen = HashSet::new();
    papers
        .iter()
        .filter(|p| seen.insert(p.booktitle.as_str()))
        .map(|p| (p.booktitle.as_str(), p.title.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::LexiconAnnotator;
    use std::path::Path;
    use tempfile::TempDir;

    fn row(cells: &[Option<&str>]) -> Row {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_conferences_dedupe_after_year_coercion() {
        let mut report = StageReport::new("conferences");
        let rows = normalize_conferences(
            vec![
                row(&[Some("ICSE"), Some("2019")]),
                row(&[Some("ICSE"), Some("2019.0")]),
                row(&[Some("ICSE"), Some("next year")]),
                row(&[None, Some("2020")]),
            ],
            &mut report,
        );

        assert_eq!(
            rows,
            vec![ConferenceRow {
                title: "ICSE".to_string(),
                year: 2019
            }]
        );
        assert_eq!(report.rejected_for(Rejection::Duplicate), 1);
        assert_eq!(report.rejected_for(Rejection::Incomplete), 2);
    }

    #[test]
    fn test_journals_keep_latest_row() {
        let mut report = StageReport::new("journals");
        let rows = normalize_journals(
            vec![
                row(&[Some("TSE"), Some("2019"), Some("45"), None]),
                row(&[Some("TSE"), Some("2019"), Some("45"), Some("2020-01-01")]),
                row(&[Some("TSE"), Some("2019"), None, Some("2020-01-01")]),
                row(&[Some("CACM"), Some("2018"), Some("61"), Some("2018-05-05")]),
            ],
            &mut report,
        );

        let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["TSE", "CACM"]);
        assert_eq!(report.rejected_for(Rejection::Superseded), 1);
        assert_eq!(report.rejected_for(Rejection::Incomplete), 1);
    }

    #[test]
    fn test_representative_titles_first_seen() {
        let paper = |key: &str, title: &str, booktitle: &str| ConferencePaperRow {
            key: key.to_string(),
            title: title.to_string(),
            booktitle: booktitle.to_string(),
            year: 2019,
            abstract_text: String::new(),
            keywords: String::new(),
        };
        let papers = vec![
            paper("k1", "Paris Traffic", "ICSE"),
            paper("k2", "Rome Traffic", "ICSE"),
            paper("k3", "Tokyo Rails", "VLDB"),
        ];
        assert_eq!(
            representative_titles(&papers),
            vec![("ICSE", "Paris Traffic"), ("VLDB", "Tokyo Rails")]
        );
    }

    const INPROCEEDINGS: &str = "\
key;title;booktitle;year;author;mdate;ee
conf/icse/Muller20;Graph Queries in Paris;ICSE;2020;Ana Muller|Bo Lee 0002;2020-05-01;
conf/icse/Muller20;Old Graph Queries;ICSE;2020;Ana Muller|Bo Lee 0002;2019-01-01;
conf/vldb/Chen19;Index Structures for Columnar Storage;VLDB;2019.0;Al Chen;2019-07-01;
conf/vldb/Kim19;Untitled;VLDB;;Cy Kim;2019-07-01;
";

    const ARTICLES: &str = "\
key;title;journal;year;volume;author;mdate
journals/tse/Lee19;Refactoring Legacy Graph Code;TSE;2019;45;Bo Lee 0002|Di Fox;2019-03-01
journals/tse/Fox19;Test Flakiness at Scale;TSE;2019;45;Di Fox;2019-02-01
journals/cacm/Roe18;Query Engines;CACM;2018;;Ed Roe;2018-01-01
";

    fn fixture(dir: &Path) -> Result<PipelineConfig> {
        std::fs::write(dir.join(INPROCEEDINGS_EXPORT), INPROCEEDINGS)?;
        std::fs::write(dir.join(ARTICLE_EXPORT), ARTICLES)?;
        Ok(PipelineConfig {
            input_dir: dir.to_path_buf(),
            work_dir: dir.join("out"),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_run_writes_every_table() -> Result<()> {
        let dir = TempDir::new()?;
        let config = fixture(dir.path())?;
        let annotator = LexiconAnnotator::new();
        let reports = Extractor::new(&config, &annotator).run().await?;

        for table in [
            PROCEEDINGS_TABLE,
            JOURNALS_TABLE,
            CONFERENCE_PAPERS_TABLE,
            JOURNAL_PAPERS_TABLE,
            CONFERENCE_KEYWORDS_TABLE,
            JOURNAL_KEYWORDS_TABLE,
            CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
            NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE,
            CORRESPONDING_JOURNAL_AUTHORS_TABLE,
            NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE,
            CONFERENCE_VENUES_TABLE,
            AFFILIATIONS_TABLE,
            REVIEWS_TABLE,
        ] {
            assert!(config.table(table).exists(), "{} missing", table);
        }

        let papers: Vec<ConferencePaperRow> = read_table(&config.table(CONFERENCE_PAPERS_TABLE))?;
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Graph Queries in Paris");

        let journals: Vec<JournalRow> = read_table(&config.table(JOURNALS_TABLE))?;
        assert_eq!(journals.len(), 1);

        let venues: Vec<VenueRow> = read_table(&config.table(CONFERENCE_VENUES_TABLE))?;
        assert_eq!(
            venues,
            vec![VenueRow {
                title: "ICSE".to_string(),
                place: "Paris".to_string()
            }]
        );

        let corresponding: Vec<AuthorshipRow> =
            read_table(&config.table(CORRESPONDING_CONFERENCE_AUTHORS_TABLE))?;
        let names: Vec<&str> = corresponding.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(names, vec!["Ana Muller", "Al Chen", "Cy Kim"]);

        let venue_report = reports.iter().find(|r| r.entity == "conference_venues");
        assert_eq!(venue_report.map(|r| r.rejected_for(Rejection::NoPlace)), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() -> Result<()> {
        let dir = TempDir::new()?;
        let config = fixture(dir.path())?;
        let annotator = LexiconAnnotator::new();

        Extractor::new(&config, &annotator).run().await?;
        let first: Vec<String> = [CONFERENCE_PAPERS_TABLE, JOURNAL_KEYWORDS_TABLE, REVIEWS_TABLE]
            .iter()
            .map(|t| std::fs::read_to_string(config.table(t)))
            .collect::<std::io::Result<_>>()?;

        Extractor::new(&config, &annotator).run().await?;
        let second: Vec<String> = [CONFERENCE_PAPERS_TABLE, JOURNAL_KEYWORDS_TABLE, REVIEWS_TABLE]
            .iter()
            .map(|t| std::fs::read_to_string(config.table(t)))
            .collect::<std::io::Result<_>>()?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_key_in_both_paper_tables_is_reviewed_once() -> Result<()> {
        let dir = TempDir::new()?;
        let config = PipelineConfig {
            work_dir: dir.path().to_path_buf(),
            reviewers_per_paper: 2,
            ..Default::default()
        };

        write_table(
            &config.table(CONFERENCE_PAPERS_TABLE),
            &[ConferencePaperRow {
                key: "shared/k1".to_string(),
                title: "Graph Queries".to_string(),
                booktitle: "ICSE".to_string(),
                year: 2019,
                abstract_text: String::new(),
                keywords: String::new(),
            }],
        )?;
        write_table(
            &config.table(JOURNAL_PAPERS_TABLE),
            &[JournalPaperRow {
                key: "shared/k1".to_string(),
                title: "Graph Queries".to_string(),
                journal: "TSE".to_string(),
                year: 2019,
                volume: "45".to_string(),
                abstract_text: String::new(),
                keywords: String::new(),
            }],
        )?;

        let authorship = |author: &str, key: &str| AuthorshipRow {
            key: key.to_string(),
            author: author.to_string(),
            last_name: author.to_string(),
            is_corresponding: true,
        };
        write_table(
            &config.table(CORRESPONDING_CONFERENCE_AUTHORS_TABLE),
            &[authorship("Ana", "shared/k1")],
        )?;
        write_table(
            &config.table(CORRESPONDING_JOURNAL_AUTHORS_TABLE),
            &[authorship("Bo", "other/k2"), authorship("Cy", "other/k3")],
        )?;
        write_table::<AuthorshipRow>(&config.table(NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE), &[])?;
        write_table::<AuthorshipRow>(&config.table(NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE), &[])?;

        let annotator = LexiconAnnotator::new();
        let reports = Extractor::new(&config, &annotator).synthesize()?;

        let reviews: Vec<ReviewRow> = read_table(&config.table(REVIEWS_TABLE))?;
        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.key == "shared/k1" && r.reviewer != "Ana"));

        let review_report = reports.iter().find(|r| r.entity == "reviews");
        assert_eq!(review_report.map(|r| r.rejected_for(Rejection::Duplicate)), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_export_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        let config = PipelineConfig {
            input_dir: dir.path().to_path_buf(),
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let annotator = LexiconAnnotator::new();
        assert!(Extractor::new(&config, &annotator).extract_conferences().is_err());
        Ok(())
    }
}
