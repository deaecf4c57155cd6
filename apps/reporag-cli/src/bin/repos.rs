use std::env;

use reporag_cli::{init_tracing, open_retriever, usage_exit};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let retriever = open_retriever().await?;
    match args.get(1).map_or("list", String::as_str) {
        "list" => {
            let repos = retriever.get_indexed_repos().await?;
            let total = retriever.count(None).await?;
            println!("📚 {} indexed repositories ({total} documents)", repos.len());
            for repo in repos {
                println!("  {repo}  ({} documents)", retriever.count(Some(&repo)).await?);
            }
        }
        "delete" => {
            let Some(repo) = args.get(2) else { usage_exit(&args[0], "delete <owner/repo>") };
            retriever.delete_repo(repo).await?;
            println!("🗑️  Deleted {repo}");
        }
        _ => usage_exit(&args[0], "[list | delete <owner/repo>]"),
    }
    Ok(())
}
