use clap::Parser;
use dxtrace::engine::{AnalysisReport, Engine, PartitionJob, PreparedFile};
use dxtrace::output::print_trace_statistics;
use dxtrace::parsers::parse_trace;
use dxtrace::utils::{prompt_yes_no, read_window_options, Logger};
use dxtrace::{log, log_error, log_warning, AnalysisConfig, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "dxtrace", version, about = "Analyze Darshan DXT I/O traces")]
struct Cli {
    /// DXT text dump (`darshan-dxt-parser` output) or JSON trace document, optionally gzipped
    trace: PathBuf,

    /// Output directory for tables, findings and the log file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only analyze requests starting at or after this time (seconds)
    #[arg(long)]
    start: Option<f64>,

    /// Only analyze requests ending at or before this time (seconds)
    #[arg(long)]
    end: Option<f64>,

    /// First rank to analyze
    #[arg(long = "from")]
    from_rank: Option<u32>,

    /// Last rank to analyze
    #[arg(long = "to")]
    to_rank: Option<u32>,

    /// Ask for the time and rank window interactively
    #[arg(short, long)]
    filter: bool,

    /// Recompute partitions even if their results are cached
    #[arg(long)]
    force: bool,

    /// Also export tables as CSV
    #[arg(long)]
    csv: bool,

    /// Print request statistics per traced file
    #[arg(long)]
    stats: bool,

    /// Analyze every snapshot of a large trace without asking
    #[arg(short, long)]
    yes: bool,

    /// Worker threads (default: number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Rows per record batch when writing Parquet
    #[arg(short = 'c', long)]
    chunk_size: Option<usize>,

    /// List the traced files and exit
    #[arg(long)]
    list: bool,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_toml(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.parquet_chunk_size = chunk_size;
        }
        config.window.start = self.start.or(config.window.start);
        config.window.end = self.end.or(config.window.end);
        config.window.from_rank = self.from_rank.or(config.window.from_rank);
        config.window.to_rank = self.to_rank.or(config.window.to_rank);
        config.force |= self.force;
        config.csv |= self.csv;
        config.stats |= self.stats;
        config.debug |= self.debug;
        Ok(config)
    }
}

fn print_no_records_hint(trace: &Path) {
    log_error!("No DXT records found in {}", trace.display());
    log_error!("To enable Darshan DXT, set this before your application runs:");
    log_error!("$ export DXT_ENABLE_IO_TRACE=1");
}

// Snapshots after the first one are analyzed only on request
fn analyze_chunks(engine: &mut Engine, file: &PreparedFile, assume_yes: bool) -> Result<AnalysisReport> {
    let base = engine.config().window;
    let plan = file.chunk_plan(engine.config().chunk_threshold);
    let total = plan.len();
    log!(
        "File {} has {} rows, analyzing in {} snapshot(s)",
        file.file_id,
        file.summary.total_logs,
        total
    );

    let mut report = AnalysisReport::default();
    let stdin = io::stdin();
    for (i, request) in plan.enumerate() {
        if i > 0 && !assume_yes {
            let question = format!("Analyze snapshot {}/{} of file {}?", i + 1, total, file.file_id);
            if !prompt_yes_no(&mut stdin.lock(), &question)? {
                log!("Stopped after {i} snapshot(s) of file {}", file.file_id);
                break;
            }
        }
        report.merge(engine.analyze(vec![file.job(&request, &base)]));
    }
    Ok(report)
}

fn print_report(report: &AnalysisReport) {
    for partition in &report.partitions {
        let origin = if partition.cached { " (cached)" } else { "" };
        println!("\nPartition {}{origin}", partition.key);
        if partition.findings.is_empty() {
            println!("  no bottleneck detected");
        }
        for finding in &partition.findings {
            println!("  [{}] {}", finding.code, finding.issue_description);
            for recommendation in &finding.recommendations {
                println!("      - {recommendation}");
            }
        }
    }
    for failure in &report.failures {
        eprintln!("\n{}", failure.error);
    }
}

fn run(cli: Cli) -> Result<bool> {
    let start_time = Instant::now();
    let trace_path = cli.trace.clone();
    let interactive_filter = cli.filter;
    let assume_yes = cli.yes;
    let list_only = cli.list;
    let mut config = cli.into_config()?;

    Logger::init(&config.output_dir);
    Logger::set_debug(config.debug);

    if interactive_filter {
        config.window = read_window_options(&mut io::stdin().lock())?;
        log!("Using analysis window '{}'", config.window.label());
    }

    let parsed = parse_trace(&trace_path)?;
    if parsed.malformed_lines > 0 {
        log_warning!("Skipped {} malformed trace line(s)", parsed.malformed_lines);
    }
    let input = parsed.input;

    if input.record_count() == 0 {
        print_no_records_hint(&trace_path);
        return Ok(true);
    }

    if list_only {
        for (file_id, file_name) in input.file_names() {
            println!("FILE: {file_name} (ID {file_id})");
        }
        println!(
            "{} I/O trace observation records from {} files",
            input.record_count(),
            input.files.len()
        );
        return Ok(true);
    }

    let show_stats = config.stats;
    let threshold = config.chunk_threshold;
    let mut engine = Engine::new(config, &trace_path)?;
    let (prepared, failures) = engine.prepare(&input);

    let mut report = AnalysisReport {
        partitions: Vec::new(),
        failures,
    };
    let base = engine.config().window;
    let mut whole_jobs: Vec<PartitionJob> = Vec::new();
    for file in &prepared {
        if file.rejected > 0 {
            log_warning!("File {}: {} access(es) rejected", file.file_id, file.rejected);
        }
        if show_stats {
            print_trace_statistics(file.file_id, &file.file_name, &file.table);
        }

        let plan = file.chunk_plan(threshold);
        if plan.is_chunked() {
            report.merge(analyze_chunks(&mut engine, file, assume_yes)?);
        } else {
            whole_jobs.extend(plan.map(|request| file.job(&request, &base)));
        }
    }
    report.merge(engine.analyze(whole_jobs));

    print_report(&report);
    log!(
        "Analyzed {} partition(s), {} failure(s) in {:.2}s",
        report.partitions.len(),
        report.failures.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = run(cli);
    if let Err(e) = Logger::flush() {
        eprintln!("Failed to flush log file: {e}");
    }

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log_error!("{e}");
            ExitCode::FAILURE
        }
    }
}
