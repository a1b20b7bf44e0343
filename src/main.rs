//! dblpgraph - DBLP export normalization and property-graph loader
//!
//! Normalizes DBLP CSV exports into headerless tables and loads them into
//! Neo4j.
//!
//! ## Usage
//!
//! ### Extract only
//! ```bash
//! dblpgraph extract --input-dir datasets --work-dir datasets
//! ```
//!
//! ### Load previously extracted tables
//! ```bash
//! NEO4J_URL=bolt://localhost:7687 dblpgraph load --work-dir datasets
//! ```
//!
//! ### Both, without a database
//! ```bash
//! dblpgraph run --dry-run
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dblpgraph::annotate::{HttpAnnotator, LexiconAnnotator, TextAnnotator};
use dblpgraph::config::{
    PipelineConfig, DEFAULT_CITATION_PROBABILITY, DEFAULT_MAX_ROWS, DEFAULT_REVIEWERS_PER_PAPER,
    DEFAULT_SEED,
};
use dblpgraph::extractor::Extractor;
use dblpgraph::graph::{GraphStore, MemoryGraph};
use dblpgraph::loader::Loader;
use dblpgraph::neo4j::{GraphConfig, Neo4jStore};
use dblpgraph::report::{LoadReport, RunManifest, StageReport};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// DBLP export normalization and property-graph loader
#[derive(Parser)]
#[command(name = "dblpgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the raw exports into the intermediate tables
    Extract {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Load the intermediate tables into the graph store
    Load {
        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Extract, then load
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        #[command(flatten)]
        graph: GraphArgs,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Directory holding output_inproceedings.csv and output_article.csv
    #[arg(long, default_value = "datasets")]
    input_dir: PathBuf,

    /// Directory for the normalized tables and manifest.json
    #[arg(long, default_value = "datasets")]
    work_dir: PathBuf,

    /// Data rows read from each export
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_rows: usize,

    /// Seed for every synthetic value
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Annotation service base URL (default: built-in lexicon)
    #[arg(long, env = "ANNOTATOR_URL")]
    annotator_url: Option<String>,

    /// Probability of a CITE edge between two papers
    #[arg(long, default_value_t = DEFAULT_CITATION_PROBABILITY)]
    citation_probability: f64,

    /// Reviewers sampled per paper
    #[arg(long, default_value_t = DEFAULT_REVIEWERS_PER_PAPER)]
    reviewers: usize,
}

impl PipelineArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            input_dir: self.input_dir.clone(),
            work_dir: self.work_dir.clone(),
            max_rows: self.max_rows,
            seed: self.seed,
            citation_probability: self.citation_probability,
            reviewers_per_paper: self.reviewers,
        };
        config.validate().context("Invalid pipeline settings")?;
        Ok(config)
    }

    fn annotator(&self) -> Result<Box<dyn TextAnnotator>> {
        match &self.annotator_url {
            Some(url) => {
                info!(url = %url, "Using remote annotation service");
                let annotator =
                    HttpAnnotator::new(url).context("Failed to create annotation client")?;
                Ok(Box::new(annotator))
            }
            None => Ok(Box::new(LexiconAnnotator::new())),
        }
    }
}

#[derive(Args)]
struct GraphArgs {
    /// Neo4j Bolt URI
    #[arg(long, env = "NEO4J_URL", default_value = "bolt://localhost:7687")]
    neo4j_url: String,

    /// Neo4j user
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true, default_value = "neo4j")]
    neo4j_password: String,

    /// Neo4j database
    #[arg(long, env = "NEO4J_DATABASE", default_value = "neo4j")]
    neo4j_database: String,

    /// Load into an in-memory graph instead of Neo4j
    #[arg(long)]
    dry_run: bool,
}

impl GraphArgs {
    fn config(&self) -> GraphConfig {
        GraphConfig {
            uri: self.neo4j_url.clone(),
            user: self.neo4j_user.clone(),
            password: self.neo4j_password.clone(),
            database: self.neo4j_database.clone(),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Extract { pipeline } => {
            let config = pipeline.config()?;
            let mut manifest = RunManifest::new(config.seed, config.max_rows);
            manifest.extract = run_extract(&config, &pipeline).await?;
            finish(&config, &manifest)
        }
        Commands::Load { pipeline, graph } => {
            let config = pipeline.config()?;
            let mut manifest = RunManifest::new(config.seed, config.max_rows);
            manifest.load = Some(run_load(&config, &graph).await?);
            finish(&config, &manifest)
        }
        Commands::Run { pipeline, graph } => {
            let config = pipeline.config()?;
            let mut manifest = RunManifest::new(config.seed, config.max_rows);
            manifest.extract = run_extract(&config, &pipeline).await?;
            manifest.load = Some(run_load(&config, &graph).await?);
            finish(&config, &manifest)
        }
    }
}

// ============================================================================
// Stages
// ============================================================================

async fn run_extract(config: &PipelineConfig, args: &PipelineArgs) -> Result<Vec<StageReport>> {
    println!("\n--- Extract: {} ---", config.input_dir.display());

    let annotator = args.annotator()?;
    let reports = Extractor::new(config, annotator.as_ref())
        .run()
        .await
        .context("Extraction failed")?;

    for report in &reports {
        report.log();
    }
    Ok(reports)
}

async fn run_load(config: &PipelineConfig, args: &GraphArgs) -> Result<LoadReport> {
    if args.dry_run {
        println!("\n--- Load: in-memory graph (dry run) ---");
        let graph = MemoryGraph::new();
        return load_into(&graph, config).await;
    }

    let graph_config = args.config();
    println!("\n--- Load: {} ---", graph_config.uri);
    let store = Neo4jStore::connect(&graph_config)
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", graph_config.uri))?;
    load_into(&store, config).await
}

async fn load_into<S: GraphStore>(store: &S, config: &PipelineConfig) -> Result<LoadReport> {
    let report = Loader::new(store, config)
        .run()
        .await
        .context("Load failed")?;

    let counts = store.counts().await.context("Failed to count graph")?;
    println!(
        "Graph holds {} nodes and {} relationships ({} unmatched rows)",
        counts.nodes,
        counts.relationships,
        report.total_unmatched()
    );
    Ok(report)
}

fn finish(config: &PipelineConfig, manifest: &RunManifest) -> Result<()> {
    std::fs::create_dir_all(&config.work_dir).context("Failed to create work directory")?;
    let path = manifest
        .write(&config.work_dir)
        .context("Failed to write run manifest")?;
    println!("\nManifest: {}", path.display());
    Ok(())
}
