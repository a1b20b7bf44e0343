//! Run configuration and seeded randomness.

use crate::error::{DblpGraphError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

/// Row cap applied to every raw export read
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Probability of a CITE edge between any ordered pair of distinct papers
pub const DEFAULT_CITATION_PROBABILITY: f64 = 0.025;

/// Reviewers sampled for each paper
pub const DEFAULT_REVIEWERS_PER_PAPER: usize = 3;

/// Seed used when none is given on the command line
pub const DEFAULT_SEED: u64 = 2019;

/// Settings shared by the Extractor and the Loader
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding `output_inproceedings.csv` and `output_article.csv`
    pub input_dir: PathBuf,
    /// Directory for the normalized tables and the manifest
    pub work_dir: PathBuf,
    pub max_rows: usize,
    pub seed: u64,
    pub citation_probability: f64,
    pub reviewers_per_paper: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("datasets"),
            work_dir: PathBuf::from("datasets"),
            max_rows: DEFAULT_MAX_ROWS,
            seed: DEFAULT_SEED,
            citation_probability: DEFAULT_CITATION_PROBABILITY,
            reviewers_per_paper: DEFAULT_REVIEWERS_PER_PAPER,
        }
    }
}

impl PipelineConfig {
    /// Reject settings no run can use.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.citation_probability) {
            return Err(DblpGraphError::Config(format!(
                "citation probability must be within [0, 1], got {}",
                self.citation_probability
            )));
        }
        if self.max_rows == 0 {
            return Err(DblpGraphError::Config("max rows must be positive".to_string()));
        }
        Ok(())
    }

    /// Path of a raw export inside the input directory
    pub fn input(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    /// Path of a normalized table inside the work directory
    pub fn table(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Independent, reproducible RNG for one synthetic stage
    pub fn rng(&self, stage: Stage) -> StdRng {
        StdRng::seed_from_u64(self.stage_seed(stage))
    }

    pub fn stage_seed(&self, stage: Stage) -> u64 {
        self.seed ^ stage.salt()
    }
}

/// Stages that draw random numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ConferenceAbstracts,
    JournalAbstracts,
    ConferenceKeywords,
    JournalKeywords,
    Affiliations,
    Reviews,
    ReviewComments,
    Citations,
}

impl Stage {
    fn salt(self) -> u64 {
        match self {
            Stage::ConferenceAbstracts => 0x9e37_79b9_7f4a_7c15,
            Stage::JournalAbstracts => 0xbf58_476d_1ce4_e5b9,
            Stage::ConferenceKeywords => 0x94d0_49bb_1331_11eb,
            Stage::JournalKeywords => 0x2545_f491_4f6c_dd1d,
            Stage::Affiliations => 0x5851_f42d_4c95_7f2d,
            Stage::Reviews => 0x1405_7b7e_f767_814f,
            Stage::ReviewComments => 0x3c6e_f372_fe94_f82b,
            Stage::Citations => 0xd6e8_feb8_6659_fd93,
        }
    }
}
