use thiserror::Error;

/// Failure taxonomy for the indexing and search pipeline.
///
/// Callers distinguish retryable conditions with [`Error::is_retryable`]:
/// transient store or network failures may succeed after a backoff, while
/// validation, missing-point and mode errors need caller intervention first.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid search mode: {0}")]
    InvalidMode(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("transient i/o failure: {0}")]
    TransientIo(String),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
