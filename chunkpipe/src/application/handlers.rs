use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chunkpipe_core::blob::BlobStore;
use chunkpipe_core::blob::factory::{Backend, open_store};
use chunkpipe_core::chunk::ChunkProcessor;
use chunkpipe_core::config::PipelineConfig;
use chunkpipe_core::domain::{ChunkDescriptor, ChunkResult, ObjectRef, SourceObject};
use chunkpipe_core::error::{PipelineError, Result};
use chunkpipe_core::merge::{MergeOptions, Merger};
use chunkpipe_core::pipeline::{LocalWorkflow, Workflow, WorkflowInput};
use chunkpipe_core::read::extract::{extract, verify};
use chunkpipe_core::read::opened::OpenedArchive;
use chunkpipe_core::split::{Splitter, plan};
use serde::Serialize;
use tracing::debug;

use crate::presentation::cli::GlobalArgs;

pub struct Context {
    pub store: Arc<dyn BlobStore>,
    pub cfg: PipelineConfig,
}

impl Context {
    pub fn from_args(global: &GlobalArgs) -> Result<Self> {
        Self::from_args_with(global, |name| std::env::var(name).ok())
    }

    /// Defaults, then `--config`, then variables from `lookup`, then flags.
    fn from_args_with(
        global: &GlobalArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let base = match &global.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        let cfg = apply_flags(base.with_vars(lookup)?, global);
        cfg.validate()?;
        debug!(?cfg, root = %global.root.display(), "resolved configuration");
        let store = open_store(Backend::Fs(global.root.clone()))?;
        Ok(Self { store, cfg })
    }
}

fn apply_flags(mut cfg: PipelineConfig, global: &GlobalArgs) -> PipelineConfig {
    if let Some(n) = global.chunk_size {
        cfg.chunk_size = n;
    }
    if let Some(n) = global.workers {
        cfg.workers = n;
    }
    if global.deterministic {
        cfg.deterministic = true;
    }
    cfg
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

fn open_archive(ctx: &Context, bucket: String, key: String) -> Result<OpenedArchive> {
    let image = ctx.store.get(&ObjectRef::new(bucket, key))?;
    OpenedArchive::open(image)
}

pub fn handle_plan(
    ctx: &Context,
    bucket: Option<String>,
    key: Option<String>,
    size: Option<u64>,
) -> Result<()> {
    let descriptors = match (bucket, key, size) {
        (_, _, Some(size)) => {
            let source = SourceObject {
                bucket: String::new(),
                key: String::new(),
                size,
            };
            plan(&source, ctx.cfg.chunk_size)?
        }
        (Some(bucket), Some(key), None) => {
            let splitter = Splitter::new(ctx.store.clone(), ctx.cfg.chunk_size);
            splitter.split(&ObjectRef::new(bucket, key))?.1
        }
        _ => {
            return Err(PipelineError::InvalidConfiguration(
                "plan needs --bucket and --key, or --size".into(),
            ));
        }
    };
    print_json(&descriptors)
}

pub fn handle_process(ctx: &Context, descriptor: PathBuf) -> Result<()> {
    let d: ChunkDescriptor = read_json(&descriptor)?;
    let result = ChunkProcessor::new(ctx.store.clone()).process(&d)?;
    print_json(&result)
}

pub fn handle_merge(ctx: &Context, results: PathBuf, bucket: String, key: String) -> Result<()> {
    let results: Vec<ChunkResult> = read_json(&results)?;
    let obj = ObjectRef::new(bucket, key);
    let size = ctx.store.head(&obj)?;
    let source = SourceObject {
        bucket: obj.bucket,
        key: obj.key,
        size,
    };
    let merger = Merger::new(ctx.store.clone(), MergeOptions::from(&ctx.cfg));
    let report = merger.merge(&results, &source)?;
    print_json(&report)
}

pub fn handle_run(ctx: &Context, bucket: String, key: String, workflow_id: String) -> Result<()> {
    let workflow = LocalWorkflow::new(ctx.store.clone(), ctx.cfg.clone())?;
    let outcome = workflow.start(&workflow_id, WorkflowInput { bucket, key })?;
    print_json(&outcome)
}

pub fn handle_archive_list(ctx: &Context, bucket: String, key: String) -> Result<()> {
    let archive = open_archive(ctx, bucket, key)?;
    print_json(&archive.list()?)
}

pub fn handle_archive_verify(ctx: &Context, bucket: String, key: String) -> Result<()> {
    let archive = open_archive(ctx, bucket, key)?;
    let summary = verify(&archive)?;
    eprintln!("verify: OK");
    print_json(&summary)
}

pub fn handle_archive_extract(
    ctx: &Context,
    bucket: String,
    key: String,
    dest: PathBuf,
) -> Result<()> {
    let archive = open_archive(ctx, bucket, key)?;
    let written = extract(&archive, &dest)?;
    print_json(&written)
}

pub fn handle_ls(ctx: &Context, bucket: String, prefix: String) -> Result<()> {
    let keys = ctx.store.list(&bucket, &prefix)?;
    print_json(&keys)
}
