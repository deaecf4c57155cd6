use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{Filter, IndexedDocument, ScoredDocument};

/// Maps text to fixed-dimension dense vectors.
///
/// Implementations are pure for a loaded model: the same text always yields
/// the same vector, and `embed_batch` output `i` belongs to input `i`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::Unavailable("embedder returned no vector".to_string()))
    }
}

/// Storage of (vector, payload) points with filtered similarity search.
///
/// Every failure of the backing store surfaces as [`Error::Unavailable`];
/// an empty search result is a valid outcome, not an error.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored vector must have.
    fn dim(&self) -> usize;

    /// Insert the documents under `repo_name`. Never deduplicates: a new id is
    /// a new row even when the content is byte-identical. The batch becomes
    /// visible to readers as a whole. Returns the number of rows inserted.
    async fn upsert(&self, repo_name: &str, documents: Vec<IndexedDocument>) -> Result<usize>;

    /// Up to `top_k` documents matching `filter`, best first. Equal scores keep
    /// insertion order.
    async fn similarity_search(
        &self,
        vector: &[f32],
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>>;

    /// Remove every document of `repo_name`. Deleting an unknown repo is a no-op.
    async fn delete_by_repo(&self, repo_name: &str) -> Result<()>;

    /// Distinct string values of a payload field, read from payload only.
    async fn list_distinct(&self, field: &str) -> Result<BTreeSet<String>>;

    async fn count(&self, filter: &Filter) -> Result<usize>;
}

/// A chat-style text completion capability: one prompt in, one text out.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
