//! Repository-scoped retrieval over a vector index.
//!
//! [`RepoRetriever`] owns the startup-constructed embedder, index and HyDE
//! augmenter, and exposes search, parent-context search, file search,
//! ingestion and repository housekeeping.

use std::collections::BTreeSet;
use std::sync::Arc;

use reporag_core::config::{RetrievalSettings, Settings};
use reporag_core::error::{Error, Result};
use reporag_core::traits::{Embedder, VectorIndex};
use reporag_core::types::{Filter, FIELD_REPO_NAME};
use reporag_embed::get_default_embedder;
use reporag_hyde::HydeAugmenter;

pub mod ingest;
pub mod search;

pub struct RepoRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    augmenter: HydeAugmenter,
    settings: RetrievalSettings,
}

impl RepoRetriever {
    /// Embedder and index must agree on dimensionality.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        augmenter: HydeAugmenter,
        settings: RetrievalSettings,
    ) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        Ok(Self { embedder, index, augmenter, settings })
    }

    /// Load the model, connect the index and wire HyDE from settings.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedding = settings.embedding.clone();
        let use_fake = settings.use_fake_embeddings();
        let embedder: Arc<dyn Embedder> =
            tokio::task::spawn_blocking(move || get_default_embedder(&embedding, use_fake))
                .await
                .map_err(|e| Error::Unavailable(format!("model loading task failed: {e}")))?
                .map(Arc::from)?;
        let index = reporag_vector::open_index(&settings.index, embedder.dim()).await?;
        let augmenter = HydeAugmenter::from_settings(&settings.hyde);
        tracing::info!(
            dim = embedder.dim(),
            backend = ?settings.index.backend,
            hyde = augmenter.is_enabled(),
            "retriever ready"
        );
        Self::new(embedder, index, augmenter, settings.retrieval.clone())
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Remove every document of `repo_name`. Unknown repositories are a no-op.
    pub async fn delete_repo(&self, repo_name: &str) -> Result<()> {
        self.index.delete_by_repo(repo_name).await?;
        tracing::info!(repo = repo_name, "deleted repository");
        Ok(())
    }

    /// Distinct repository names currently present in the index.
    pub async fn get_indexed_repos(&self) -> Result<BTreeSet<String>> {
        self.index.list_distinct(FIELD_REPO_NAME).await
    }

    /// Stored documents for one repository, or for the whole index.
    pub async fn count(&self, repo_name: Option<&str>) -> Result<usize> {
        let filter = repo_name.map_or_else(Filter::new, Filter::repo);
        self.index.count(&filter).await
    }

    /// Embed off the async runtime; the model call is CPU bound.
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::Unavailable(format!("embedding task failed: {e}")))??;
        if vectors.len() != expected {
            return Err(Error::Unavailable(format!(
                "embedder returned {} vectors for {expected} texts",
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Unavailable("embedder returned no vector".into()))
    }
}
