use reporag_core::error::{Error, Result};
use reporag_core::types::{Document, IndexedDocument, SourceDocument};

use crate::RepoRetriever;

impl RepoRetriever {
    /// Embed every document in one batch, give each a fresh id and store it
    /// under `repo_name`. Returns the number of documents stored.
    pub async fn index_documents(
        &self,
        repo_name: &str,
        documents: Vec<SourceDocument>,
    ) -> Result<usize> {
        let batch = self.prepare(repo_name, documents).await?;
        self.store(repo_name, batch).await
    }

    /// Replace a repository's content: delete everything stored under
    /// `repo_name`, then insert `documents`. Embedding happens before the
    /// delete, so an embedder failure leaves the old content in place.
    pub async fn reindex_repo(
        &self,
        repo_name: &str,
        documents: Vec<SourceDocument>,
    ) -> Result<usize> {
        let batch = self.prepare(repo_name, documents).await?;
        self.delete_repo(repo_name).await?;
        self.store(repo_name, batch).await
    }

    async fn prepare(
        &self,
        repo_name: &str,
        documents: Vec<SourceDocument>,
    ) -> Result<Vec<IndexedDocument>> {
        if repo_name.is_empty() {
            return Err(Error::InvalidInput("repo_name must not be empty".into()));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embed_texts(texts).await?;

        Ok(documents
            .into_iter()
            .zip(vectors)
            .map(|(source, vector)| {
                let id = uuid::Uuid::new_v4().to_string();
                let (document, dropped) = Document::from_source(id, repo_name, source);
                if !dropped.is_empty() {
                    tracing::warn!(
                        repo = repo_name,
                        keys = ?dropped,
                        "dropped reserved metadata keys"
                    );
                }
                IndexedDocument { document, vector }
            })
            .collect())
    }

    async fn store(&self, repo_name: &str, batch: Vec<IndexedDocument>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let n = self.index.upsert(repo_name, batch).await?;
        tracing::info!(repo = repo_name, documents = n, "indexed documents");
        Ok(n)
    }
}
