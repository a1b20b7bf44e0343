//! # dblpgraph
//!
//! DBLP export normalization and property-graph loading.
//!
//! ## Modules
//!
//! - [`table`] - Row-capped reader for the semicolon-delimited exports
//! - [`extractor`] - Extraction stages writing the normalized tables
//! - [`papers`] - Last-write-wins paper selection and enrichment
//! - [`authors`] - Author explosion and corresponding-author split
//! - [`keywords`] - Keyword frequency accumulator and backfill
//! - [`synthetic`] - Synthetic affiliations and reviews
//! - [`annotate`] - Noun tagging, place extraction and lorem ipsum
//! - [`records`] - Typed rows of the normalized tables
//! - [`graph`] - Graph store trait and in-memory store
//! - [`neo4j`] - Neo4j graph store
//! - [`loader`] - Loading stage
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dblpgraph::annotate::LexiconAnnotator;
//! use dblpgraph::config::PipelineConfig;
//! use dblpgraph::extractor::Extractor;
//! use dblpgraph::graph::MemoryGraph;
//! use dblpgraph::loader::Loader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::default();
//!     let annotator = LexiconAnnotator::new();
//!     Extractor::new(&config, &annotator).run().await?;
//!
//!     let graph = MemoryGraph::new();
//!     let report = Loader::new(&graph, &config).run().await?;
//!     println!("Unmatched rows: {}", report.total_unmatched());
//!     Ok(())
//! }
//! ```

pub mod annotate;
pub mod authors;
pub mod config;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod keywords;
pub mod loader;
pub mod neo4j;
pub mod normalize;
pub mod papers;
pub mod records;
pub mod report;
pub mod synthetic;
pub mod table;

pub use error::{DblpGraphError, Result};
