use std::env;

use reporag_cli::{init_tracing, open_retriever, usage_exit};

const USAGE: &str = "<owner/repo> <query> [--top-k N] [--type T] [--hyde] [--context] [--files]";

enum Mode {
    Plain,
    Context,
    Files,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage_exit(&args[0], USAGE);
    }
    let repo_name = &args[1];
    let query = &args[2];
    let mut top_k = None;
    let mut doc_type = None;
    let mut use_hyde = false;
    let mut mode = Mode::Plain;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => {
                let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) else {
                    eprintln!("Error: --top-k requires a number");
                    std::process::exit(1);
                };
                top_k = Some(n);
                i += 1;
            }
            "--type" | "-t" => {
                let Some(t) = args.get(i + 1) else {
                    eprintln!("Error: --type requires a document type");
                    std::process::exit(1);
                };
                doc_type = Some(t.clone());
                i += 1;
            }
            "--hyde" => use_hyde = true,
            "--context" => mode = Mode::Context,
            "--files" => mode = Mode::Files,
            other => {
                eprintln!("Unknown option: {other}");
                usage_exit(&args[0], USAGE);
            }
        }
        i += 1;
    }

    let retriever = open_retriever().await?;
    let results = match mode {
        Mode::Plain => {
            let k = top_k.unwrap_or(retriever.settings().default_top_k);
            retriever.search(query, repo_name, k, doc_type.as_deref(), use_hyde).await?
        }
        Mode::Context => {
            let k = top_k.unwrap_or(retriever.settings().context_top_k);
            retriever.search_with_context(query, repo_name, k).await?
        }
        Mode::Files => retriever.search_for_files(query, repo_name).await?,
    };

    println!("🔍 Found {} results for \"{query}\" in {repo_name}", results.len());
    for (i, r) in results.iter().enumerate() {
        let parent = if r.is_parent { "  (parent)" } else { "" };
        println!("\n  {}. score={:.4}  type={}{parent}", i + 1, r.score, r.doc_type);
        if !r.metadata.is_empty() {
            println!("     metadata: {}", serde_json::Value::Object(r.metadata.clone()));
        }
        println!("     {}", r.content.replace('\n', "\n     "));
    }
    Ok(())
}
