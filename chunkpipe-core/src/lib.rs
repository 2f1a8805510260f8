#![forbid(unsafe_code)]

pub mod error;
pub mod config;
pub mod domain;
pub mod keys;

pub mod blob;

pub mod split;
pub mod chunk;
pub mod merge;
pub mod pipeline;

pub mod util {
    pub mod hash_forward;
}

pub mod codec;

pub mod container {
    pub mod entrytab;
    pub mod manifest;
    pub mod superblock;
    pub mod tail;
}

pub mod pack {
    pub mod writer;
}

pub mod read {
    pub mod extract;
    pub mod opened;
}

// Re-exports: stable API surface
pub use blob::factory::{Backend, open_store};
pub use blob::{BlobStore, StoreError};
pub use chunk::{ChunkProcessor, RecordSet};
pub use config::PipelineConfig;
pub use domain::{ByteRange, ChunkDescriptor, ChunkResult, ObjectRef, SourceObject};
pub use error::{ErrorKind, PipelineError, Result};
pub use merge::manifest::ArchiveManifest;
pub use merge::{MergeOptions, MergeReport, Merger};
pub use pack::writer::{NamedEntry, PackOptions, pack};
pub use pipeline::{CancelToken, LocalWorkflow, Workflow, WorkflowInput, WorkflowOutcome};
pub use read::extract::{extract, verify};
pub use read::opened::OpenedArchive;
pub use split::{Splitter, plan};
