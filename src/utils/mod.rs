pub mod compression;
pub mod constants;
pub mod filter;
pub mod logger;
pub mod stats;

pub use self::compression::{read_trace_bytes, CompressionFormat, TraceBytes};
pub use self::filter::{filter_accesses, filter_partition, prompt_yes_no, read_window_options};
pub use self::logger::Logger;
pub use self::stats::{mean, population_std_dev, round_time};
