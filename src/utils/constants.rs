// Rows per file above which the trace is analyzed in time snapshots
pub const CHUNK_THRESHOLD_ROWS: u64 = 20_000_000;

// Start/end timestamps are kept at 4 decimal digits (100 µs)
pub const TIME_DECIMALS: i32 = 4;

// Population z-score a rank must exceed on every workload metric to count as unbalanced
pub const UNBALANCED_Z_SCORE: f64 = 1.0;

// POSIX requests smaller than this are candidates for metadata operations
pub const METADATA_MAX_REQUEST_SIZE: u64 = 93_000;

// Default number of rows per record batch when writing Parquet
pub const DEFAULT_PARQUET_CHUNK_SIZE: usize = 50_000;
