pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processors;
pub mod utils;

pub use config::AnalysisConfig;
pub use engine::{AnalysisReport, ChunkPlan, ChunkRequest, Engine, PartitionCache, PartitionKey};
pub use error::{AnalysisError, Result};
pub use models::{IOPhase, NormalizedAccess, StripeLayout, TraceInput, TraceSummary};
pub use parsers::parse_trace;
pub use processors::{detect_phases, normalize_file, osts_for, run_detectors};
