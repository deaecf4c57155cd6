use serde_json::json;
use tempfile::tempdir;

use reporag_core::error::Error;
use reporag_core::traits::VectorIndex;
use reporag_core::types::{Document, Filter, IndexedDocument, SourceDocument};
use reporag_vector::LanceIndex;

fn indexed(id: &str, source: SourceDocument, vector: Vec<f32>) -> IndexedDocument {
    let (document, _) = Document::from_source(id.to_string(), "", source);
    IndexedDocument { document, vector }
}

async fn open(dir: &std::path::Path, dim: usize) -> LanceIndex {
    let uri = dir.to_string_lossy();
    LanceIndex::open(&uri, None, "repo_docs", dim).await.expect("open lance index")
}

#[tokio::test]
async fn search_is_scoped_to_repo_and_best_first() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 3).await;

    index
        .upsert(
            "x/y",
            vec![
                indexed("1", SourceDocument::new("install guide", "readme"), vec![1.0, 0.0, 0.0]),
                indexed("2", SourceDocument::new("license", "readme"), vec![0.0, 1.0, 0.0]),
            ],
        )
        .await
        .expect("upsert x/y");
    let other = indexed("3", SourceDocument::new("install guide", "readme"), vec![1.0, 0.0, 0.0]);
    index.upsert("a/b", vec![other]).await.expect("upsert a/b");

    let hits =
        index.similarity_search(&[1.0, 0.1, 0.0], &Filter::repo("x/y"), 5).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document.id, "1");
    assert_eq!(hits[0].document.repo_name, "x/y");
    assert!(hits[0].score > hits[1].score);
    assert!(hits.iter().all(|h| h.document.repo_name == "x/y"));
}

#[tokio::test]
async fn metadata_filter_and_list_values() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 2).await;
    let docs = vec![
        indexed(
            "setup",
            SourceDocument::new("run cargo build", "readme").with_meta("section_title", "Setup"),
            vec![1.0, 0.0],
        ),
        indexed(
            "bug",
            SourceDocument::new("crash on start", "issue")
                .with_meta("labels", json!(["bug", "p1"])),
            vec![1.0, 0.0],
        ),
    ];
    index.upsert("x/y", docs).await.expect("upsert");

    let filter = Filter::repo("x/y").eq("section_title", "Setup");
    let hits = index.similarity_search(&[1.0, 0.0], &filter, 5).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.metadata.get("section_title"), Some(&json!("Setup")));

    let filter = Filter::repo("x/y").eq("labels", "bug");
    assert_eq!(index.count(&filter).await.expect("count"), 1);

    let labels = index.list_distinct("labels").await.expect("distinct");
    assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec!["bug".to_string(), "p1".to_string()]);
}

#[tokio::test]
async fn delete_is_idempotent_and_repos_are_listed() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 2).await;
    let first = indexed("1", SourceDocument::new("a", "readme"), vec![1.0, 0.0]);
    index.upsert("x/y", vec![first]).await.expect("upsert");
    let second = indexed("2", SourceDocument::new("b", "readme"), vec![0.0, 1.0]);
    index.upsert("a/b", vec![second]).await.expect("upsert");

    let repos = index.list_distinct("repo_name").await.expect("repos");
    assert_eq!(repos.into_iter().collect::<Vec<_>>(), vec!["a/b".to_string(), "x/y".to_string()]);

    index.delete_by_repo("x/y").await.expect("delete");
    index.delete_by_repo("x/y").await.expect("second delete is a no-op");
    index.delete_by_repo("never/indexed").await.expect("unknown repo");

    assert_eq!(index.count(&Filter::repo("x/y")).await.expect("count"), 0);
    assert_eq!(index.count(&Filter::new()).await.expect("count"), 1);
    let hits = index.similarity_search(&[1.0, 0.0], &Filter::repo("x/y"), 5).await.expect("search");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 2).await;
    let docs = (0..4)
        .map(|i| indexed(&format!("d{i}"), SourceDocument::new("same", "readme"), vec![1.0, 1.0]))
        .collect();
    index.upsert("x/y", docs).await.expect("upsert");
    let hits = index.similarity_search(&[1.0, 1.0], &Filter::repo("x/y"), 4).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(ids, vec!["d0", "d1", "d2", "d3"]);
}

#[tokio::test]
async fn tied_rows_past_top_k_keep_insertion_order() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 2).await;
    // five separate adds leave five fragments of identical vectors
    for batch in 0..5 {
        let docs = (0..20)
            .map(|i| {
                let id = format!("r{batch}d{i:02}");
                indexed(&id, SourceDocument::new("same text", "readme"), vec![0.6, 0.8])
            })
            .collect();
        index.upsert("x/y", docs).await.expect("upsert");
    }
    let best = indexed("best", SourceDocument::new("closer", "readme"), vec![1.0, 0.0]);
    index.upsert("x/y", vec![best]).await.expect("upsert");

    let hits =
        index.similarity_search(&[0.6, 0.8], &Filter::repo("x/y"), 3).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(ids, vec!["r0d00", "r0d01", "r0d02"]);

    let hits =
        index.similarity_search(&[0.9, 0.2], &Filter::repo("x/y"), 3).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(ids, vec!["best", "r0d00", "r0d01"]);
}

#[tokio::test]
async fn reopening_with_another_dimension_fails() {
    let dir = tempdir().expect("tempdir");
    drop(open(dir.path(), 4).await);
    let err = LanceIndex::open(&dir.path().to_string_lossy(), None, "repo_docs", 8)
        .await
        .err()
        .expect("must fail");
    assert!(matches!(err, Error::DimensionMismatch { expected: 8, actual: 4 }));
}

#[tokio::test]
async fn wrong_query_dimension_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let index = open(dir.path(), 3).await;
    let err = index.similarity_search(&[1.0], &Filter::new(), 1).await.expect_err("must fail");
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}
