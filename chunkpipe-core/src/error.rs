use thiserror::Error;

use crate::blob::StoreError;

/// Coarse failure classes handed to whoever schedules the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    RangeReadFailure,
    PersistFailure,
    NoResults,
    SourceMismatch,
    Store,
    Format,
    Io,
    Serialization,
    PipelineFailed,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("range read failed for chunk {chunk_number} ({bucket}/{key} bytes {start}-{end}): {source}")]
    RangeRead {
        chunk_number: u32,
        bucket: String,
        key: String,
        start: u64,
        end: u64,
        #[source]
        source: StoreError,
    },

    #[error("persist failed for {bucket}/{key}: {source}")]
    Persist {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("merge called with no chunk results")]
    NoResults,

    #[error("chunk results reference more than one source: expected {expected}, found {found}")]
    SourceMismatch { expected: String, found: String },

    #[error("chunk number {0} appears more than once in the merge input")]
    DuplicateChunk(u32),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("pipeline failed: {} chunk(s) did not complete: {}", .failures.len(), summarize(.failures))]
    PipelineFailed { failures: Vec<ChunkFailure> },

    #[error("pipeline cancelled")]
    Cancelled,
}

/// One chunk that exhausted its attempts during fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_number: u32,
    pub attempts: u32,
    pub kind: ErrorKind,
    pub reason: String,
}

fn summarize(failures: &[ChunkFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("chunk {} after {} attempt(s): {}", f.chunk_number, f.attempts, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            PipelineError::RangeRead { .. } => ErrorKind::RangeReadFailure,
            PipelineError::Persist { .. } => ErrorKind::PersistFailure,
            PipelineError::NoResults => ErrorKind::NoResults,
            PipelineError::SourceMismatch { .. } | PipelineError::DuplicateChunk(_) => {
                ErrorKind::SourceMismatch
            }
            PipelineError::Store(_) => ErrorKind::Store,
            PipelineError::Format(_) => ErrorKind::Format,
            PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Serialization(_) => ErrorKind::Serialization,
            PipelineError::PipelineFailed { .. } => ErrorKind::PipelineFailed,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Range reads and writes may succeed on a later attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RangeReadFailure | ErrorKind::PersistFailure
        )
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Serialization(e.to_string())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, PipelineError>;
