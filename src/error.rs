use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Malformed trace line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("Invalid stripe layout: {0}")]
    InvalidStripeLayout(String),
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },
    #[error("Partition {key} failed: {reason}")]
    Partition { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
