use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use reporag_cli::{init_tracing, open_retriever, usage_exit};
use reporag_core::types::SourceDocument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage_exit(&args[0], "<owner/repo> <documents.json>");
    }
    let repo_name = &args[1];
    let path = PathBuf::from(&args[2]);

    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let documents: Vec<SourceDocument> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {} as a JSON array of documents", path.display()))?;

    println!("reporag-index\n=============");
    println!("Repository: {repo_name}");
    println!("Documents:  {} ({})", documents.len(), path.display());

    let retriever = open_retriever().await?;
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("embedding and storing {} documents", documents.len()));
    let indexed = retriever.reindex_repo(repo_name, documents).await?;
    pb.finish_with_message("done");

    println!("\n✅ Indexed {indexed} documents for {repo_name} (previous content replaced)");
    Ok(())
}
