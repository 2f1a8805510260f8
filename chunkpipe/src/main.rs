mod application;
mod presentation;

use chunkpipe_core::error::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stdout carries JSON results; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    application::run()
}
