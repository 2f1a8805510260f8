pub mod handlers;

use crate::presentation::cli::{ArchiveCommands, Cli, Commands};
use chunkpipe_core::error::Result;
use clap::Parser;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = handlers::Context::from_args(&cli.global)?;
    match cli.command {
        Commands::Plan { bucket, key, size } => handlers::handle_plan(&ctx, bucket, key, size),
        Commands::Process { descriptor } => handlers::handle_process(&ctx, descriptor),
        Commands::Merge {
            results,
            bucket,
            key,
        } => handlers::handle_merge(&ctx, results, bucket, key),
        Commands::Run {
            bucket,
            key,
            workflow_id,
        } => handlers::handle_run(&ctx, bucket, key, workflow_id),
        Commands::Archive(cmd) => match cmd {
            ArchiveCommands::List { bucket, key } => {
                handlers::handle_archive_list(&ctx, bucket, key)
            }
            ArchiveCommands::Verify { bucket, key } => {
                handlers::handle_archive_verify(&ctx, bucket, key)
            }
            ArchiveCommands::Extract { bucket, key, dest } => {
                handlers::handle_archive_extract(&ctx, bucket, key, dest)
            }
        },
        Commands::Ls { bucket, prefix } => handlers::handle_ls(&ctx, bucket, prefix),
    }
}
