use crate::error::Result;
use crate::models::AnalysisWindow;
use crate::processors::DetectorSelection;
use crate::utils::constants::{CHUNK_THRESHOLD_ROWS, DEFAULT_PARQUET_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Run settings. Every field is optional in the TOML file; CLI flags are
/// applied on top by the shell.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub output_dir: PathBuf,
    pub chunk_threshold: u64,
    pub threads: usize,
    pub force: bool,
    pub parquet_chunk_size: usize,
    pub window: AnalysisWindow,
    pub detectors: DetectorSelection,
    pub csv: bool,
    pub stats: bool,
    pub debug: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            chunk_threshold: CHUNK_THRESHOLD_ROWS,
            threads: num_cpus::get(),
            force: false,
            parquet_chunk_size: DEFAULT_PARQUET_CHUNK_SIZE,
            window: AnalysisWindow::default(),
            detectors: DetectorSelection::default(),
            csv: false,
            stats: false,
            debug: false,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn worker_threads(&self) -> usize {
        self.threads.max(1)
    }
}
