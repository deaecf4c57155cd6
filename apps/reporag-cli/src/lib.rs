//! Shared startup for the command-line tools.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use reporag_core::config::{Config, IndexBackend};
use reporag_retrieval::RepoRetriever;

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Load layered configuration and build the retriever it describes.
pub async fn open_retriever() -> anyhow::Result<RepoRetriever> {
    let settings = Config::load().context("loading configuration")?.settings()?;
    if settings.index.backend == IndexBackend::Memory {
        tracing::warn!("index.backend is \"memory\": nothing persists past this process");
    }
    RepoRetriever::from_settings(&settings).await.context("starting retriever")
}

/// Print `usage` to stderr and exit with status 1.
pub fn usage_exit(prog: &str, usage: &str) -> ! {
    eprintln!("Usage: {prog} {usage}");
    std::process::exit(1)
}
