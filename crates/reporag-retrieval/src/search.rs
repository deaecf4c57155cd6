use reporag_core::error::Result;
use reporag_core::types::{doc_types, Filter, SearchResult};

use crate::RepoRetriever;

/// Fixed lookup text for the parent document; the fetch is not a similarity
/// contest with the user's query.
const PARENT_QUERY: &str = "full readme overview";
const FILES_FALLBACK_PREFIX: &str = "files directories";
/// Gap kept between the parent score and the weakest section hit.
const PARENT_SCORE_MARGIN: f32 = 1e-3;

impl RepoRetriever {
    /// Up to `top_k` documents of `repo_name`, best first, optionally limited
    /// to one `doc_type`. With `use_hyde` a long enough query is replaced by a
    /// hypothetical answer before embedding.
    pub async fn search(
        &self,
        query: &str,
        repo_name: &str,
        top_k: usize,
        doc_type: Option<&str>,
        use_hyde: bool,
    ) -> Result<Vec<SearchResult>> {
        let text = if use_hyde { self.augmenter.augment(query).await } else { query.to_string() };
        let vector = self.embed_query(&text).await?;
        let filter = Filter::repo(repo_name).doc_type(doc_type);
        let hits = self.index.similarity_search(&vector, &filter, top_k).await?;
        tracing::debug!(
            repo = repo_name,
            ?doc_type,
            top_k,
            hits = hits.len(),
            hyde = text != query,
            "search"
        );
        Ok(hits.into_iter().map(SearchResult::from).collect())
    }

    /// HyDE search, plus the repository's full README appended as a parent
    /// when any `readme` section matched. The parent scores strictly below
    /// every returned hit, so the list may grow to `top_k + 1`.
    pub async fn search_with_context(
        &self,
        query: &str,
        repo_name: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut results = self.search(query, repo_name, top_k, None, true).await?;
        if !results.iter().any(|r| r.doc_type == doc_types::README) {
            return Ok(results);
        }
        let parent =
            self.search(PARENT_QUERY, repo_name, 1, Some(doc_types::README_FULL), false).await?;
        if let Some(mut parent) = parent.into_iter().next() {
            let floor = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
            parent.score = self.settings.parent_score.min(floor - PARENT_SCORE_MARGIN);
            parent.is_parent = true;
            tracing::debug!(repo = repo_name, score = parent.score, "appended parent document");
            results.push(parent);
        }
        Ok(results)
    }

    /// Search the repository's file tree; when it has none, fall back to a
    /// broader search framed around files and directories.
    pub async fn search_for_files(
        &self,
        query: &str,
        repo_name: &str,
    ) -> Result<Vec<SearchResult>> {
        let top_k = self.settings.files_top_k;
        let results =
            self.search(query, repo_name, top_k, Some(doc_types::FILE_TREE), false).await?;
        if !results.is_empty() {
            return Ok(results);
        }
        let framed = format!("{FILES_FALLBACK_PREFIX} {query}");
        self.search(&framed, repo_name, self.settings.files_fallback_top_k, None, false).await
    }
}
