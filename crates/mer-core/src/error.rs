use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the consolidation pipeline.
#[derive(Error, Debug)]
pub enum MerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A delimited file could not be parsed into a table.
    #[error("Failed to parse table {path}: {reason}")]
    TableParse { path: PathBuf, reason: String },

    /// A JSON document (catalog override) could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The archive root does not exist or is not a directory.
    #[error("Archive directory not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// No month under the archive root yielded a single metric.
    #[error("No monthly data could be extracted from {0}")]
    NoMonthsExtracted(PathBuf),

    /// The classifier was asked for a metric that no record carries.
    #[error("Metric not present in any month: {0}")]
    MetricUnavailable(String),

    /// A directory name does not end in a `<Mon><YYYY>` token.
    #[error("Cannot parse month from directory name: {0}")]
    InvalidMonthDirectory(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the consolidation crates.
pub type Result<T> = std::result::Result<T, MerError>;
