//! In-process orchestration: split, fan out one task per chunk on a bounded
//! pool, fan in, then merge exactly once.
//!
//! A chunk that keeps failing after `max_attempts` fails the whole run and the
//! merger is never invoked. Record sets already written by other chunks stay
//! behind; their keys are deterministic so a rerun overwrites them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::blob::BlobStore;
use crate::chunk::ChunkProcessor;
use crate::config::PipelineConfig;
use crate::domain::{ChunkDescriptor, ChunkResult, ObjectRef, SourceObject};
use crate::error::{ChunkFailure, ErrorKind, PipelineError, Result};
use crate::merge::manifest::ArchiveManifest;
use crate::merge::{MergeOptions, Merger};
use crate::split::Splitter;

/// Deeply nested records are decoded recursively on worker threads.
const WORKER_STACK: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub bucket: String,
    pub key: String,
}

impl WorkflowInput {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.key.clone())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowReport {
    pub workflow_id: String,
    pub source: SourceObject,
    pub results: Vec<ChunkResult>,
    /// None when the source was empty and nothing was planned.
    pub archive: Option<ObjectRef>,
    pub manifest: Option<ArchiveManifest>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed { report: WorkflowReport },
    Skipped { reason: String },
}

/// Starts the split, process, merge sequence for one uploaded object.
pub trait Workflow {
    fn start(&self, workflow_id: &str, input: WorkflowInput) -> Result<WorkflowOutcome>;
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct LocalWorkflow {
    store: Arc<dyn BlobStore>,
    cfg: PipelineConfig,
    pool: ThreadPool,
    cancel: CancelToken,
}

impl LocalWorkflow {
    pub fn new(store: Arc<dyn BlobStore>, cfg: PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(cfg.workers)
            .thread_name(|i| format!("chunkpipe-worker-{i}"))
            .stack_size(WORKER_STACK)
            .build()
            .map_err(|e| PipelineError::InvalidConfiguration(format!("worker pool: {e}")))?;
        Ok(Self {
            store,
            cfg,
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn process_all(
        &self,
        descriptors: &[ChunkDescriptor],
    ) -> Vec<std::result::Result<ChunkResult, ChunkFailure>> {
        let processor = ChunkProcessor::new(self.store.clone());
        self.pool.install(|| {
            descriptors
                .par_iter()
                .map(|d| self.process_with_retry(&processor, d))
                .collect()
        })
    }

    fn process_with_retry(
        &self,
        processor: &ChunkProcessor,
        d: &ChunkDescriptor,
    ) -> std::result::Result<ChunkResult, ChunkFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(ChunkFailure {
                    chunk_number: d.chunk_number,
                    attempts: attempt - 1,
                    kind: ErrorKind::Cancelled,
                    reason: PipelineError::Cancelled.to_string(),
                });
            }
            match processor.process(d) {
                Ok(r) => return Ok(r),
                Err(e) if e.is_retryable() && attempt < self.cfg.max_attempts => {
                    let delay = self.cfg.retry_backoff_ms * u64::from(attempt);
                    warn!(
                        chunk = d.chunk_number,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "chunk failed, retrying"
                    );
                    thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => {
                    error!(chunk = d.chunk_number, attempt, error = %e, "chunk failed");
                    return Err(ChunkFailure {
                        chunk_number: d.chunk_number,
                        attempts: attempt,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

impl Workflow for LocalWorkflow {
    fn start(&self, workflow_id: &str, input: WorkflowInput) -> Result<WorkflowOutcome> {
        if !input.key.starts_with(&self.cfg.upload_prefix) {
            info!(workflow_id, key = %input.key, "key outside upload prefix, skipping");
            return Ok(WorkflowOutcome::Skipped {
                reason: format!(
                    "{} is not under {:?}",
                    input.key, self.cfg.upload_prefix
                ),
            });
        }

        let obj = input.object_ref();
        info!(workflow_id, object = %obj, "workflow started");
        let (source, descriptors) =
            Splitter::new(self.store.clone(), self.cfg.chunk_size).split(&obj)?;

        if descriptors.is_empty() {
            info!(workflow_id, object = %obj, "empty source, nothing to merge");
            return Ok(WorkflowOutcome::Completed {
                report: WorkflowReport {
                    workflow_id: workflow_id.to_string(),
                    source,
                    results: Vec::new(),
                    archive: None,
                    manifest: None,
                },
            });
        }

        let outcomes = self.process_all(&descriptors);
        if self.cancel.is_cancelled() {
            warn!(workflow_id, "cancelled before merge");
            return Err(PipelineError::Cancelled);
        }

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for o in outcomes {
            match o {
                Ok(r) => results.push(r),
                Err(f) => failures.push(f),
            }
        }
        if !failures.is_empty() {
            error!(workflow_id, failed = failures.len(), "pipeline failed before merge");
            return Err(PipelineError::PipelineFailed { failures });
        }

        let merger = Merger::new(self.store.clone(), MergeOptions::from(&self.cfg));
        let merged = merger.merge(&results, &source)?;
        info!(workflow_id, archive = %merged.archive, "workflow completed");

        Ok(WorkflowOutcome::Completed {
            report: WorkflowReport {
                workflow_id: workflow_id.to_string(),
                source,
                results,
                archive: Some(merged.archive),
                manifest: Some(merged.manifest),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::mem::MemStore;
    use crate::keys::archive_key;

    const KEY: &str = "uploads/recipes.json";

    fn body() -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..40 {
            out.extend_from_slice(format!(r#"{{"id":"{i:03}"}}"#).as_bytes());
            out.push(b'\n');
        }
        out
    }

    fn cfg() -> PipelineConfig {
        PipelineConfig {
            chunk_size: 100,
            workers: 3,
            max_attempts: 3,
            retry_backoff_ms: 0,
            deterministic: true,
            ..Default::default()
        }
    }

    fn store_with(data: &[u8]) -> Arc<MemStore> {
        let store = Arc::new(MemStore::new());
        store.put(&ObjectRef::new("b", KEY), data).unwrap();
        store
    }

    fn input() -> WorkflowInput {
        WorkflowInput {
            bucket: "b".into(),
            key: KEY.into(),
        }
    }

    fn completed(outcome: WorkflowOutcome) -> WorkflowReport {
        match outcome {
            WorkflowOutcome::Completed { report } => report,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_run_produces_archive() {
        let data = body();
        let store = store_with(&data);
        let wf = LocalWorkflow::new(store.clone(), cfg()).unwrap();
        let report = completed(wf.start("wf-1", input()).unwrap());

        // 40 records of 13 bytes each; one record straddles each of the 5 cuts
        assert_eq!(report.results.len(), 6);
        let numbers: Vec<u32> = report.results.iter().map(|r| r.chunk_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4, 5]);

        let archive = report.archive.unwrap();
        assert_eq!(archive.key, archive_key(KEY));
        assert!(store.head(&archive).is_ok());
        let manifest = report.manifest.unwrap();
        assert_eq!(manifest.processing.total_chunks, 6);
        assert_eq!(manifest.processing.total_records, 35);
    }

    #[test]
    fn test_transient_read_failure_is_retried() {
        let store = store_with(&body());
        store.fail_reads(&ObjectRef::new("b", KEY), 2);
        let wf = LocalWorkflow::new(store, cfg()).unwrap();
        let report = completed(wf.start("wf-2", input()).unwrap());
        assert!(report.archive.is_some());
    }

    #[test]
    fn test_exhausted_retries_fail_without_merge() {
        let store = store_with(&body());
        store.fail_reads(&ObjectRef::new("b", KEY), 1_000);
        let wf = LocalWorkflow::new(
            store.clone(),
            PipelineConfig {
                max_attempts: 2,
                ..cfg()
            },
        )
        .unwrap();
        let err = wf.start("wf-3", input()).unwrap_err();
        match err {
            PipelineError::PipelineFailed { failures } => {
                assert_eq!(failures.len(), 6);
                assert!(failures.iter().all(|f| f.attempts == 2));
                assert!(failures.iter().all(|f| f.kind == ErrorKind::RangeReadFailure));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(store.head(&ObjectRef::new("b", archive_key(KEY))).is_err());
    }

    #[test]
    fn test_cancelled_run_never_merges() {
        let store = store_with(&body());
        let token = CancelToken::new();
        let wf = LocalWorkflow::new(store.clone(), cfg())
            .unwrap()
            .with_cancel(token.clone());
        token.cancel();
        let err = wf.start("wf-4", input()).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_key_outside_upload_prefix_is_skipped() {
        let store = Arc::new(MemStore::new());
        store.put(&ObjectRef::new("b", "other/x.json"), b"{}").unwrap();
        let wf = LocalWorkflow::new(store.clone(), cfg()).unwrap();
        let outcome = wf
            .start(
                "wf-5",
                WorkflowInput {
                    bucket: "b".into(),
                    key: "other/x.json".into(),
                },
            )
            .unwrap();
        assert!(matches!(outcome, WorkflowOutcome::Skipped { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_source_completes_without_archive() {
        let store = store_with(b"");
        let wf = LocalWorkflow::new(store.clone(), cfg()).unwrap();
        let report = completed(wf.start("wf-6", input()).unwrap());
        assert!(report.archive.is_none());
        assert!(report.results.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_source() {
        let wf = LocalWorkflow::new(Arc::new(MemStore::new()), cfg()).unwrap();
        let err = wf.start("wf-7", input()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = PipelineConfig {
            workers: 0,
            ..cfg()
        };
        assert!(matches!(
            LocalWorkflow::new(Arc::new(MemStore::new()), bad),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }
}
