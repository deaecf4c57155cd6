use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A dependency (embedding runtime, vector store) is down or timed out.
    #[error("Retrieval unavailable: {0}")]
    Unavailable(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn unavailable(e: impl std::fmt::Display) -> Self {
        Self::Unavailable(e.to_string())
    }

    pub fn generation(e: impl std::fmt::Display) -> Self {
        Self::Generation(e.to_string())
    }

    /// True for failures a caller may reasonably retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Generation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
