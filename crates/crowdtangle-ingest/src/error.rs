//! Error types for the ingest binary.
//!
//! [`IngestError`] wraps every failure mode of a run so `main` can
//! propagate with `?`.

/// Top-level error for the ingest binary.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Connecting, migrating, or writing a batch failed.
    #[error("database error: {source}")]
    Db {
        /// The underlying data-layer error.
        #[from]
        source: crowdtangle_db::DbError,
    },

    /// Reading the input failed.
    #[error("input error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An input line is not a JSON array of post records.
    #[error("line {line}: malformed batch: {source}")]
    Parse {
        /// 1-based line number in the input.
        line: usize,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A configuration value is invalid.
    #[error("config error: {0}")]
    Config(String),
}
