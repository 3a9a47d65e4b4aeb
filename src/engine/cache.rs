use crate::error::Result;
use crate::models::AnalysisWindow;
use crate::{log_debug, log_warning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE_NAME: &str = "cache.json";

// Window label reserved for the per-file normalized table and summary
const TABLE_LABEL: &str = "dxt";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub file_id: u64,
    pub window: String,
}

impl PartitionKey {
    pub fn new(file_id: u64, window: &AnalysisWindow) -> Self {
        Self {
            file_id,
            window: window.label(),
        }
    }

    pub fn table(file_id: u64) -> Self {
        Self {
            file_id,
            window: TABLE_LABEL.to_string(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file_id, self.window)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Normalized,
    Summary,
    Phases,
    Stragglers,
    Findings,
}

/// Output file naming for one trace: `<stem>.<file_id>[.<window>].<suffix>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactNames {
    output_dir: PathBuf,
    stem: String,
}

impl ArtifactNames {
    pub fn new(output_dir: &Path, stem: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            stem: stem.into(),
        }
    }

    pub fn path(&self, kind: ArtifactKind, key: &PartitionKey) -> PathBuf {
        let id = key.file_id;
        let label = &key.window;
        let name = match kind {
            ArtifactKind::Normalized => format!("{}.{id}.dxt.parquet", self.stem),
            ArtifactKind::Summary => format!("{}.{id}.summary.parquet", self.stem),
            ArtifactKind::Phases => format!("{}.{id}.{label}.io_phases.parquet", self.stem),
            ArtifactKind::Stragglers => format!("{}.{id}.{label}.stragglers.parquet", self.stem),
            ArtifactKind::Findings => format!("{}.{id}.{label}.json", self.stem),
        };
        self.output_dir.join(name)
    }

    // CSV twin of a table artifact
    pub fn csv_path(&self, kind: ArtifactKind, key: &PartitionKey) -> PathBuf {
        self.path(kind, key).with_extension("csv")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: PartitionKey,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Manifest {
    entries: Vec<CacheEntry>,
}

/// Completed partitions of previous runs, persisted as `cache.json` in the
/// output directory. An entry is only trusted while every artifact it lists
/// is still on disk.
#[derive(Debug)]
pub struct PartitionCache {
    path: PathBuf,
    entries: BTreeMap<PartitionKey, CacheEntry>,
}

impl PartitionCache {
    /// Load the manifest from `output_dir`. With `force` the previous entries
    /// are dropped so every partition is recomputed.
    pub fn open(output_dir: &Path, force: bool) -> Result<Self> {
        let path = output_dir.join(MANIFEST_FILE_NAME);
        let mut cache = Self {
            path,
            entries: BTreeMap::new(),
        };

        if force {
            log_debug!("Ignoring partition cache {}", cache.path.display());
            cache.save()?;
            return Ok(cache);
        }
        if !cache.path.exists() {
            return Ok(cache);
        }

        let reader = BufReader::new(File::open(&cache.path)?);
        match serde_json::from_reader::<_, Manifest>(reader) {
            Ok(manifest) => {
                cache.entries = manifest
                    .entries
                    .into_iter()
                    .map(|entry| (entry.key.clone(), entry))
                    .collect();
            }
            Err(e) => {
                log_warning!("Unreadable cache manifest {}, starting empty: {e}", cache.path.display());
            }
        }
        Ok(cache)
    }

    pub fn lookup(&self, key: &PartitionKey) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.artifacts.iter().all(|path| path.exists()))
    }

    /// Record a partition whose artifacts are all written. The manifest is
    /// rewritten immediately.
    pub fn record(&mut self, key: PartitionKey, artifacts: Vec<PathBuf>) -> Result<()> {
        self.entries
            .insert(key.clone(), CacheEntry { key, artifacts });
        self.save()
    }

    pub fn invalidate(&mut self, key: &PartitionKey) -> Result<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Replaced through a temporary file and rename
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let manifest = Manifest {
            entries: self.entries.values().cloned().collect(),
        };
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &manifest)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
