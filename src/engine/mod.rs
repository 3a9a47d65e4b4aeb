mod cache;
mod chunking;

pub use cache::{ArtifactKind, ArtifactNames, CacheEntry, PartitionCache, PartitionKey};
pub use chunking::{ChunkPlan, ChunkRequest};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::models::{
    AnalysisWindow, BottleneckFinding, FileTrace, FindingsDocument, NormalizedAccess, SnapshotWindow,
    TraceInput, TraceSummary,
};
use crate::output::{
    read_accesses, read_findings, read_summary, save_accesses, save_accesses_to_csv, save_phases,
    save_phases_to_csv, save_stragglers, save_stragglers_to_csv, save_summary, write_findings,
};
use crate::processors::{detect_phases, normalize_file, run_detectors, DetectorSelection};
use crate::utils::filter_partition;
use crate::{log, log_error, log_warning};
use crossbeam_channel::unbounded;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// One traced file after normalization. The table is shared read-only by
/// every partition cut from it.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub file_id: u64,
    pub file_name: String,
    pub table: Arc<Vec<NormalizedAccess>>,
    pub summary: TraceSummary,
    pub rejected: usize,
    pub from_cache: bool,
}

impl PreparedFile {
    pub fn chunk_plan(&self, threshold: u64) -> ChunkPlan {
        ChunkPlan::from_summary(&self.summary, threshold)
    }

    pub fn job(&self, request: &ChunkRequest, base: &AnalysisWindow) -> PartitionJob {
        PartitionJob {
            key: PartitionKey::new(self.file_id, &request.window(base)),
            table: Arc::clone(&self.table),
            window: *base,
            snapshot: request.snapshot().copied(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartitionJob {
    pub key: PartitionKey,
    pub table: Arc<Vec<NormalizedAccess>>,
    // Operator window; the snapshot, if any, further selects by start time
    pub window: AnalysisWindow,
    pub snapshot: Option<SnapshotWindow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    pub key: PartitionKey,
    pub findings: Vec<BottleneckFinding>,
    pub artifacts: Vec<PathBuf>,
    pub cached: bool,
}

// Worker -> writer message
struct PartitionOutcome {
    key: PartitionKey,
    result: Result<PartitionResult>,
}

#[derive(Debug)]
pub struct PartitionFailure {
    pub key: PartitionKey,
    pub error: AnalysisError,
}

#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub partitions: Vec<PartitionResult>,
    pub failures: Vec<PartitionFailure>,
}

impl AnalysisReport {
    pub fn findings(&self) -> impl Iterator<Item = &BottleneckFinding> {
        self.partitions.iter().flat_map(|p| p.findings.iter())
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: AnalysisReport) {
        self.partitions.extend(other.partitions);
        self.failures.extend(other.failures);
    }
}

// Settings a worker needs, copied into each spawned task
#[derive(Debug, Clone, Copy)]
struct PartitionSettings {
    detectors: DetectorSelection,
    csv: bool,
}

/// `run.darshan.txt.gz` -> `run.darshan`
pub fn trace_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    let name = name
        .strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".gzip"))
        .unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

pub struct Engine {
    config: AnalysisConfig,
    names: ArtifactNames,
    cache: PartitionCache,
    pool: ThreadPool,
}

impl Engine {
    pub fn new(config: AnalysisConfig, trace_path: &Path) -> Result<Self> {
        fs::create_dir_all(&config.output_dir)?;
        let names = ArtifactNames::new(&config.output_dir, trace_stem(trace_path));
        let cache = PartitionCache::open(&config.output_dir, config.force)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads())
            .build()?;
        Ok(Self {
            config,
            names,
            cache,
            pool,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn names(&self) -> &ArtifactNames {
        &self.names
    }

    /// Normalize every file of the trace in parallel and write its table and
    /// summary. Files whose artifacts are cached are read back instead.
    pub fn prepare(&mut self, input: &TraceInput) -> (Vec<PreparedFile>, Vec<PartitionFailure>) {
        let start_time = Instant::now();
        let traces: Vec<(&FileTrace, bool)> = input
            .files
            .values()
            .map(|trace| {
                let cached = self.cache.lookup(&PartitionKey::table(trace.file_id)).is_some();
                (trace, cached)
            })
            .collect();

        let names = &self.names;
        let config = &self.config;
        let results: Vec<(u64, Result<PreparedFile>)> = self.pool.install(|| {
            traces
                .par_iter()
                .map(|&(trace, cached)| (trace.file_id, prepare_file(names, config, trace, cached)))
                .collect()
        });

        let mut prepared = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (file_id, result) in results {
            let key = PartitionKey::table(file_id);
            match result {
                Ok(file) => {
                    if !file.from_cache {
                        let artifacts = vec![
                            self.names.path(ArtifactKind::Normalized, &key),
                            self.names.path(ArtifactKind::Summary, &key),
                        ];
                        if let Err(e) = self.cache.record(key, artifacts) {
                            log_warning!("Cannot update cache manifest: {e}");
                        }
                    }
                    prepared.push(file);
                }
                Err(e) => {
                    log_error!("Preparing file {file_id} failed: {e}");
                    failures.push(partition_failure(key, e));
                }
            }
        }

        log!(
            "Prepared {} file(s) in {:.2}s",
            prepared.len(),
            start_time.elapsed().as_secs_f64()
        );
        (prepared, failures)
    }

    /// Analyze partitions on the worker pool. Results flow through a channel
    /// to this thread, which alone updates the report and the cache manifest.
    pub fn analyze(&mut self, jobs: Vec<PartitionJob>) -> AnalysisReport {
        let mut report = AnalysisReport::default();
        let mut pending = Vec::with_capacity(jobs.len());

        for job in jobs {
            if self.cache.lookup(&job.key).is_some() {
                match read_findings(&self.names.path(ArtifactKind::Findings, &job.key)) {
                    Ok(document) => {
                        log!("Partition {} already analyzed, skipping", job.key);
                        report.partitions.push(PartitionResult {
                            artifacts: partition_artifacts(&self.names, &job.key),
                            key: job.key,
                            findings: document.dxt,
                            cached: true,
                        });
                        continue;
                    }
                    Err(e) => log_warning!("Cached findings for {} unreadable, recomputing: {e}", job.key),
                }
            }
            pending.push(job);
        }

        let settings = PartitionSettings {
            detectors: self.config.detectors,
            csv: self.config.csv,
        };
        let (sender, receiver) = unbounded();
        for job in pending {
            let sender = sender.clone();
            let names = self.names.clone();
            self.pool.spawn(move || {
                let outcome = PartitionOutcome {
                    key: job.key.clone(),
                    result: analyze_partition(&job, &names, settings),
                };
                if sender.send(outcome).is_err() {
                    log_error!("Result of partition {} dropped", job.key);
                }
            });
        }
        drop(sender);

        for outcome in receiver.iter() {
            match outcome.result {
                Ok(result) => {
                    if let Err(e) = self.cache.record(result.key.clone(), result.artifacts.clone()) {
                        log_warning!("Cannot update cache manifest: {e}");
                    }
                    report.partitions.push(result);
                }
                Err(e) => {
                    log_error!("Partition {} failed: {e}", outcome.key);
                    report.failures.push(partition_failure(outcome.key, e));
                }
            }
        }

        report.partitions.sort_by(|a, b| a.key.cmp(&b.key));
        report.failures.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    /// Non-interactive run: prepare every file and analyze all of its chunks.
    pub fn run(&mut self, input: &TraceInput) -> AnalysisReport {
        let (prepared, failures) = self.prepare(input);
        let base = self.config.window;
        let threshold = self.config.chunk_threshold;
        let jobs: Vec<PartitionJob> = prepared
            .iter()
            .flat_map(|file| {
                file.chunk_plan(threshold)
                    .map(|request| file.job(&request, &base))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut report = AnalysisReport {
            partitions: Vec::new(),
            failures,
        };
        report.merge(self.analyze(jobs));
        report
    }
}

fn partition_failure(key: PartitionKey, error: AnalysisError) -> PartitionFailure {
    PartitionFailure {
        error: AnalysisError::Partition {
            key: key.to_string(),
            reason: error.to_string(),
        },
        key,
    }
}

fn partition_artifacts(names: &ArtifactNames, key: &PartitionKey) -> Vec<PathBuf> {
    [ArtifactKind::Phases, ArtifactKind::Stragglers, ArtifactKind::Findings]
        .into_iter()
        .map(|kind| names.path(kind, key))
        .collect()
}

fn prepare_file(
    names: &ArtifactNames,
    config: &AnalysisConfig,
    trace: &FileTrace,
    cached: bool,
) -> Result<PreparedFile> {
    let key = PartitionKey::table(trace.file_id);
    let table_path = names.path(ArtifactKind::Normalized, &key);
    let summary_path = names.path(ArtifactKind::Summary, &key);

    if cached {
        match read_accesses(&table_path).and_then(|table| Ok((table, read_summary(&summary_path)?))) {
            Ok((table, summary)) => {
                log!("Reusing normalized table {}", table_path.display());
                return Ok(PreparedFile {
                    file_id: trace.file_id,
                    file_name: trace.file_name.clone(),
                    table: Arc::new(table),
                    summary,
                    rejected: 0,
                    from_cache: true,
                });
            }
            Err(e) => log_warning!("Cached table {} unreadable, normalizing again: {e}", table_path.display()),
        }
    }

    let outcome = normalize_file(trace);
    let summary = TraceSummary::from_table(&outcome.accesses);
    save_accesses(&outcome.accesses, &table_path, config.parquet_chunk_size)?;
    save_summary(&summary, &summary_path)?;
    if config.csv {
        save_accesses_to_csv(&outcome.accesses, &names.csv_path(ArtifactKind::Normalized, &key))?;
    }

    Ok(PreparedFile {
        file_id: trace.file_id,
        file_name: trace.file_name.clone(),
        table: Arc::new(outcome.accesses),
        summary,
        rejected: outcome.rejected.len(),
        from_cache: false,
    })
}

fn analyze_partition(
    job: &PartitionJob,
    names: &ArtifactNames,
    settings: PartitionSettings,
) -> Result<PartitionResult> {
    let start_time = Instant::now();
    let table = filter_partition(&job.table, &job.window, job.snapshot.as_ref());
    let phases = detect_phases(&table);
    let report = run_detectors(&table, &phases, &settings.detectors);
    let findings = report.findings();

    let artifacts = partition_artifacts(names, &job.key);
    save_phases(&phases, &artifacts[0])?;
    save_stragglers(&report.stragglers, &artifacts[1])?;
    write_findings(
        &FindingsDocument {
            dxt: findings.clone(),
        },
        &artifacts[2],
    )?;
    if settings.csv {
        save_phases_to_csv(&phases, &names.csv_path(ArtifactKind::Phases, &job.key))?;
        save_stragglers_to_csv(&report.stragglers, &names.csv_path(ArtifactKind::Stragglers, &job.key))?;
    }

    log!(
        "Partition {}: {} row(s), {} phase(s), {} finding(s) in {:.2}s",
        job.key,
        table.len(),
        phases.len(),
        findings.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(PartitionResult {
        key: job.key.clone(),
        findings,
        artifacts,
        cached: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RankRecord, RawSegment};

    fn sample_input() -> TraceInput {
        let mut trace = FileTrace::new(7, "/scratch/out.dat");
        for rank in 0..4u32 {
            let writes = if rank == 0 { 100 } else { 10 };
            let mut record = RankRecord::new(rank);
            for i in 0..writes {
                record.write_segments.push(RawSegment {
                    offset: ((rank as i64) << 30) | (i << 20),
                    length: 1 << 20,
                    start_time: 0.0,
                    end_time: 1.0,
                });
            }
            trace.posix.push(record);
        }
        let mut input = TraceInput::default();
        input.files.insert(7, trace);
        input
    }

    fn config(dir: &Path) -> AnalysisConfig {
        AnalysisConfig {
            output_dir: dir.to_path_buf(),
            threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_trace_stem() {
        assert_eq!(trace_stem(Path::new("logs/run.darshan.txt.gz")), "run.darshan");
        assert_eq!(trace_stem(Path::new("trace.json")), "trace");
        assert_eq!(trace_stem(Path::new("plain")), "plain");
    }

    #[test]
    fn test_run_writes_artifacts_and_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_input();

        let mut engine = Engine::new(config(dir.path()), Path::new("run.darshan.txt")).unwrap();
        let report = engine.run(&input);
        assert!(report.is_success());
        assert_eq!(report.partitions.len(), 1);
        assert!(!report.partitions[0].cached);
        assert!(report.findings().any(|f| f.code == "D01"));
        assert!(dir.path().join("run.7.dxt.parquet").exists());
        assert!(dir.path().join("run.7.summary.parquet").exists());
        assert!(dir.path().join("run.7.all.io_phases.parquet").exists());
        assert!(dir.path().join("run.7.all.stragglers.parquet").exists());
        assert!(dir.path().join("run.7.all.json").exists());
        assert_eq!(read_accesses(&dir.path().join("run.7.dxt.parquet")).unwrap().len(), 130);

        let mut again = Engine::new(config(dir.path()), Path::new("run.darshan.txt")).unwrap();
        let (prepared, _) = again.prepare(&input);
        assert!(prepared[0].from_cache);
        let cached = again.run(&input);
        assert!(cached.partitions[0].cached);
        assert_eq!(cached.partitions[0].findings, report.partitions[0].findings);

        let forced_config = AnalysisConfig {
            force: true,
            ..config(dir.path())
        };
        let mut forced = Engine::new(forced_config, Path::new("run.darshan.txt")).unwrap();
        assert!(!forced.run(&input).partitions[0].cached);
    }

    #[test]
    fn test_large_trace_is_split_into_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let chunked = AnalysisConfig {
            chunk_threshold: 50,
            ..config(dir.path())
        };
        let mut engine = Engine::new(chunked, Path::new("big.txt")).unwrap();
        let input = sample_input();
        let (prepared, _) = engine.prepare(&input);
        let file = &prepared[0];

        let jobs: Vec<PartitionJob> = file
            .chunk_plan(50)
            .map(|request| file.job(&request, &AnalysisWindow::default()))
            .collect();
        assert_eq!(jobs.len(), 3);
        let rows: usize = jobs
            .iter()
            .map(|job| filter_partition(&job.table, &job.window, job.snapshot.as_ref()).len())
            .sum();
        assert_eq!(rows, file.table.len());

        let report = engine.analyze(jobs);
        assert!(report.is_success());
        assert_eq!(report.partitions.len(), 3);
        assert!(report.partitions.iter().all(|p| p.key.window.starts_with('s')));
        // All accesses start at 0.0, so the first snapshot sees the whole workload
        let first = report
            .partitions
            .iter()
            .find(|p| p.key.window.starts_with("s0_"))
            .unwrap();
        assert!(first.findings.iter().any(|f| f.code == "D01"));
    }

    #[test]
    fn test_failing_partition_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(config(dir.path()), Path::new("run.txt")).unwrap();
        let (prepared, failures) = engine.prepare(&sample_input());
        assert!(failures.is_empty());

        let good = prepared[0].job(&ChunkRequest::Whole, &AnalysisWindow::default());
        let bad = prepared[0].job(
            &ChunkRequest::Whole,
            &AnalysisWindow {
                from_rank: Some(1),
                ..Default::default()
            },
        );
        // A directory where the findings file should go makes the write fail
        fs::create_dir_all(engine.names().path(ArtifactKind::Findings, &bad.key)).unwrap();

        let report = engine.analyze(vec![good, bad]);
        assert_eq!(report.partitions.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key.window, "n1");
        assert!(matches!(report.failures[0].error, AnalysisError::Partition { .. }));
    }
}
