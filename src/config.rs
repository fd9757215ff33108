use crate::errors::{PepSeekError, Result};
use crate::peptides::ingest::DEFAULT_PEPTIDE_COLUMN;
use crate::scan::matcher::MatchStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "output/unknown_peptides";

/// Everything one run needs. No path is resolved against ambient state
/// other than the process working directory for relative paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub peptides: PathBuf,
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub peptide_column: String,
    /// `None` uses every logical cpu.
    pub workers: Option<usize>,
    pub worker_timeout_secs: Option<u64>,
    pub strategy: MatchStrategy,
    pub progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            peptides: PathBuf::new(),
            database: PathBuf::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            prefix: "sample".to_string(),
            peptide_column: DEFAULT_PEPTIDE_COLUMN.to_string(),
            workers: None,
            worker_timeout_secs: None,
            strategy: MatchStrategy::default(),
            progress: false,
        }
    }
}

impl ScanConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.peptides.as_os_str().is_empty() {
            return Err(PepSeekError::Config("no peptide file given".to_string()));
        }
        if self.database.as_os_str().is_empty() {
            return Err(PepSeekError::Config("no database file given".to_string()));
        }
        if self.prefix.is_empty() {
            return Err(PepSeekError::Config("output prefix is empty".to_string()));
        }
        if self.workers == Some(0) {
            return Err(PepSeekError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.worker_timeout_secs == Some(0) {
            return Err(PepSeekError::Config(
                "worker timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}
