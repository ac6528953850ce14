use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors surfaced by the spectral core.
///
/// Only [`SpectraError::MalformedInput`] and [`SpectraError::EmptyResult`]
/// are meant to reach the end user; the rest are plumbing failures of the
/// ingestion layer. Out-of-range points and tolerance misses are not errors.
#[derive(Debug, Error)]
pub enum SpectraError {
    /// The input could not be decoded at all (not text, not a record).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Parsing or normalization left zero usable points.
    #[error("no usable spectrum: {0}")]
    EmptyResult(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("parquet: {0}")]
    Parquet(String),
}

impl SpectraError {
    /// Whether the caller should show this as a transient retrieval error.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            SpectraError::MalformedInput(_) | SpectraError::EmptyResult(_)
        )
    }
}

impl From<parquet::errors::ParquetError> for SpectraError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        SpectraError::Parquet(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for SpectraError {
    fn from(err: arrow::error::ArrowError) -> Self {
        SpectraError::Parquet(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpectraError>;
