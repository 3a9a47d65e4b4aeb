mod csv;
mod findings;
pub(crate) mod parquet;
mod reader;
mod statistics;

pub use self::csv::{save_accesses_to_csv, save_phases_to_csv, save_stragglers_to_csv};
pub use findings::{read_findings, write_findings};
pub use parquet::{save_accesses, save_phases, save_stragglers, save_summary};
pub use reader::{read_accesses, read_phases, read_stragglers, read_summary};
pub use statistics::{compute_statistics, print_trace_statistics, TraceStatistics};
