//! Loading Stage
//!
//! Reads the normalized tables back into typed records and upserts them into
//! a [`GraphStore`]. Mutable node classes are purged before they are
//! reloaded; `Author` nodes are only ever merged. Rows whose match target is
//! missing produce no relationship and are counted in the [`LoadReport`].

use crate::config::{PipelineConfig, Stage};
use crate::error::Result;
use crate::graph::{GraphStore, Label, NodeRef, Properties, RelType};
use crate::records::*;
use crate::report::LoadReport;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// `startDate` of a conference edition
pub fn start_date(year: i32) -> String {
    format!("{}-01-01", year)
}

/// `endDate` of a conference edition
pub fn end_date(year: i32) -> String {
    format!("{}-01-02", year)
}

/// Loads one work directory into one store
pub struct Loader<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    config: &'a PipelineConfig,
    report: LoadReport,
}

impl<'a, S: GraphStore + ?Sized> Loader<'a, S> {
    pub fn new(store: &'a S, config: &'a PipelineConfig) -> Self {
        Self {
            store,
            config,
            report: LoadReport::default(),
        }
    }

    /// Run every load step in order and return the counters.
    pub async fn run(mut self) -> Result<LoadReport> {
        info!(work_dir = %self.config.work_dir.display(), "Starting load");

        self.load_conferences().await?;
        self.add_index_to_conferences().await?;
        self.load_journals().await?;
        self.add_index_to_journals().await?;
        self.load_conference_venues().await?;
        self.delete_papers().await?;
        self.load_conference_papers().await?;
        self.load_journal_papers().await?;
        self.add_index_to_papers().await?;
        self.load_keywords().await?;
        self.load_authors(CORRESPONDING_CONFERENCE_AUTHORS_TABLE).await?;
        self.load_authors(CORRESPONDING_JOURNAL_AUTHORS_TABLE).await?;
        self.load_authors(NON_CORRESPONDING_CONFERENCE_AUTHORS_TABLE).await?;
        self.load_authors(NON_CORRESPONDING_JOURNAL_AUTHORS_TABLE).await?;
        self.load_affiliations().await?;
        self.load_reviews().await?;
        self.generate_random_citations().await?;

        let counts = self.store.counts().await?;
        if self.report.total_unmatched() > 0 {
            warn!(unmatched = ?self.report.unmatched, "Some rows matched nothing in the graph");
        }
        info!(
            nodes = counts.nodes,
            relationships = counts.relationships,
            "Load complete"
        );
        Ok(self.report)
    }

    fn read<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        read_table(&self.config.table(table))
    }

    async fn purge(&mut self, label: Label) -> Result<()> {
        let removed = self.store.delete_all(label).await?;
        self.report.purged.insert(label.as_str(), removed);
        info!(label = %label, removed, "Purged nodes");
        Ok(())
    }

    async fn node(&mut self, node: &NodeRef, props: &Properties) -> Result<()> {
        self.store.upsert_node(node, props).await?;
        self.report.add_nodes(node.label.as_str(), 1);
        Ok(())
    }

    /// Merge an edge; returns false when an endpoint is missing.
    async fn link(
        &mut self,
        rel: RelType,
        from: &NodeRef,
        to: &NodeRef,
        props: &Properties,
    ) -> Result<bool> {
        let merged = self.store.upsert_relationship(rel, from, to, props).await?;
        self.report.add_relationships(rel.as_str(), merged);
        Ok(merged > 0)
    }

    fn finish(&mut self, table: &str, rows: usize, unmatched: usize) {
        self.report.add_unmatched(table, unmatched);
        if unmatched > 0 {
            warn!(table, rows, unmatched, "Rows without a match target");
        } else {
            info!(table, rows, "Table loaded");
        }
    }

    pub async fn load_conferences(&mut self) -> Result<()> {
        self.purge(Label::Conference).await?;
        let rows: Vec<ConferenceRow> = self.read(PROCEEDINGS_TABLE)?;
        for row in &rows {
            let node = conference(&row.title, row.year);
            self.node(&node, &vec![("endDate", end_date(row.year).into())])
                .await?;
        }
        self.finish(PROCEEDINGS_TABLE, rows.len(), 0);
        Ok(())
    }

    pub async fn add_index_to_conferences(&mut self) -> Result<()> {
        self.store.create_index(Label::Conference, "title").await
    }

    pub async fn load_journals(&mut self) -> Result<()> {
        self.purge(Label::Journal).await?;
        let rows: Vec<JournalRow> = self.read(JOURNALS_TABLE)?;
        for row in &rows {
            self.node(&journal(&row.title, row.year, &row.volume), &Vec::new())
                .await?;
        }
        self.finish(JOURNALS_TABLE, rows.len(), 0);
        Ok(())
    }

    pub async fn add_index_to_journals(&mut self) -> Result<()> {
        self.store.create_index(Label::Journal, "title").await
    }

    /// Set `venue` on every Conference edition with the row's title.
    pub async fn load_conference_venues(&mut self) -> Result<()> {
        let rows: Vec<VenueRow> = self.read(CONFERENCE_VENUES_TABLE)?;
        let mut unmatched = 0;
        for row in &rows {
            let node = NodeRef::new(Label::Conference).with("title", row.title.as_str());
            let props = vec![("venue", row.place.as_str().into())];
            if self.store.set_properties(&node, &props).await? == 0 {
                unmatched += 1;
            }
        }
        self.finish(CONFERENCE_VENUES_TABLE, rows.len(), unmatched);
        Ok(())
    }

    pub async fn delete_papers(&mut self) -> Result<()> {
        self.purge(Label::Paper).await
    }

    pub async fn load_conference_papers(&mut self) -> Result<()> {
        let rows: Vec<ConferencePaperRow> = self.read(CONFERENCE_PAPERS_TABLE)?;
        let mut unmatched = 0;
        for row in &rows {
            let paper = self.paper(&row.key, &row.title, &row.abstract_text).await?;
            let venue = conference(&row.booktitle, row.year);
            if !self.link(RelType::PublishedIn, &paper, &venue, &Vec::new()).await? {
                unmatched += 1;
            }
        }
        self.finish(CONFERENCE_PAPERS_TABLE, rows.len(), unmatched);
        Ok(())
    }

    pub async fn load_journal_papers(&mut self) -> Result<()> {
        let rows: Vec<JournalPaperRow> = self.read(JOURNAL_PAPERS_TABLE)?;
        let mut unmatched = 0;
        for row in &rows {
            let paper = self.paper(&row.key, &row.title, &row.abstract_text).await?;
            let venue = journal(&row.journal, row.year, &row.volume);
            if !self.link(RelType::PublishedIn, &paper, &venue, &Vec::new()).await? {
                unmatched += 1;
            }
        }
        self.finish(JOURNAL_PAPERS_TABLE, rows.len(), unmatched);
        Ok(())
    }

    async fn paper(&mut self, key: &str, title: &str, abstract_text: &str) -> Result<NodeRef> {
        let node = NodeRef::new(Label::Paper).with("key", key);
        let props = vec![("title", title.into()), ("abstract", abstract_text.into())];
        self.node(&node, &props).await?;
        Ok(node)
    }

    pub async fn add_index_to_papers(&mut self) -> Result<()> {
        self.store.create_index(Label::Paper, "key").await
    }

    /// Keyword nodes and HAS_KEYWORD edges for both paper kinds.
    pub async fn load_keywords(&mut self) -> Result<()> {
        self.purge(Label::Keyword).await?;
        for table in [CONFERENCE_KEYWORDS_TABLE, JOURNAL_KEYWORDS_TABLE] {
            let rows: Vec<KeywordRow> = self.read(table)?;
            let mut unmatched = 0;
            for row in &rows {
                let keyword = NodeRef::new(Label::Keyword).with("name", row.keyword.as_str());
                self.node(&keyword, &Vec::new()).await?;
                let paper = NodeRef::new(Label::Paper).with("key", row.key.as_str());
                if !self.link(RelType::HasKeyword, &paper, &keyword, &Vec::new()).await? {
                    unmatched += 1;
                }
            }
            self.finish(table, rows.len(), unmatched);
        }
        Ok(())
    }

    /// Author nodes and WRITE edges from one authorship table.
    pub async fn load_authors(&mut self, table: &str) -> Result<()> {
        let rows: Vec<AuthorshipRow> = self.read(table)?;
        let mut unmatched = 0;
        for row in &rows {
            let author = NodeRef::new(Label::Author).with("name", row.author.as_str());
            self.node(&author, &Vec::new()).await?;
            let paper = NodeRef::new(Label::Paper).with("key", row.key.as_str());
            let props = vec![("is_corresponding", row.is_corresponding.into())];
            if !self.link(RelType::Write, &author, &paper, &props).await? {
                unmatched += 1;
            }
        }
        self.finish(table, rows.len(), unmatched);
        Ok(())
    }

    pub async fn load_affiliations(&mut self) -> Result<()> {
        self.purge(Label::School).await?;
        let rows: Vec<AffiliationRow> = self.read(AFFILIATIONS_TABLE)?;
        let mut unmatched = 0;
        for row in &rows {
            let school = NodeRef::new(Label::School).with("name", row.school.as_str());
            self.node(&school, &Vec::new()).await?;
            let author = NodeRef::new(Label::Author).with("name", row.author.as_str());
            if !self.link(RelType::AffiliatedWith, &author, &school, &Vec::new()).await? {
                unmatched += 1;
            }
        }
        self.finish(AFFILIATIONS_TABLE, rows.len(), unmatched);
        Ok(())
    }

    pub async fn load_reviews(&mut self) -> Result<()> {
        let rows: Vec<ReviewRow> = self.read(REVIEWS_TABLE)?;
        let mut unmatched = 0;
        for row in &rows {
            let reviewer = NodeRef::new(Label::Author).with("name", row.reviewer.as_str());
            let paper = NodeRef::new(Label::Paper).with("key", row.key.as_str());
            let props = vec![("comment", row.comment.as_str().into())];
            if !self.link(RelType::Reviewed, &reviewer, &paper, &props).await? {
                unmatched += 1;
            }
        }
        self.finish(REVIEWS_TABLE, rows.len(), unmatched);
        Ok(())
    }

    /// CITE edges between random pairs of papers.
    pub async fn generate_random_citations(&mut self) -> Result<()> {
        let merged = self
            .store
            .generate_random_edges(
                Label::Paper,
                RelType::Cite,
                "key",
                self.config.citation_probability,
                self.config.stage_seed(Stage::Citations),
            )
            .await?;
        self.report.add_relationships(RelType::Cite.as_str(), merged);
        info!(citations = merged, "Random citations generated");
        Ok(())
    }
}

fn conference(title: &str, year: i32) -> NodeRef {
    NodeRef::new(Label::Conference)
        .with("title", title)
        .with("startDate", start_date(year))
}

fn journal(title: &str, year: i32, volume: &str) -> NodeRef {
    NodeRef::new(Label::Journal)
        .with("title", title)
        .with("date", start_date(year))
        .with("volume", volume)
}
