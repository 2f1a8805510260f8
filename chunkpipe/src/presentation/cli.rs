use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "chunkpipe: split, process and merge large JSON uploads", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Root directory of the filesystem blob store (one subdirectory per bucket)
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// JSON config file; CHUNKPIPE_* env vars and flags override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Chunk size in bytes
    #[arg(long, global = true)]
    pub chunk_size: Option<u64>,

    /// Worker threads for `run`
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Zero timestamps so identical inputs give identical archives
    #[arg(long, global = true)]
    pub deterministic: bool,
}

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List archive entries
    List {
        #[arg(long)]
        bucket: String,
        /// archive object key (e.g. processed/recipes_processed.zip)
        #[arg(long)]
        key: String,
    },

    /// Verify digests and decode every entry
    Verify {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },

    /// Extract every entry to a local directory
    Extract {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        dest: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print chunk descriptors for an object (or for a bare size)
    Plan {
        #[arg(long, requires = "key")]
        bucket: Option<String>,
        #[arg(long, requires = "bucket")]
        key: Option<String>,
        /// plan for a size without touching the store
        #[arg(long, conflicts_with_all = ["bucket", "key"])]
        size: Option<u64>,
    },

    /// Process one chunk descriptor (JSON file) and print its result
    Process { descriptor: PathBuf },

    /// Merge chunk results (JSON array file) into the source's archive
    Merge {
        results: PathBuf,
        #[arg(long)]
        bucket: String,
        /// source object key
        #[arg(long)]
        key: String,
    },

    /// Run the whole pipeline for one object in-process
    Run {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "local")]
        workflow_id: String,
    },

    #[command(subcommand)]
    /// Inspect a merged archive
    Archive(ArchiveCommands),

    /// List object keys in a bucket
    Ls {
        #[arg(long)]
        bucket: String,
        #[arg(long, default_value = "")]
        prefix: String,
    },
}
