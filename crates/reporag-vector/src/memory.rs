use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use reporag_core::error::Result;
use reporag_core::traits::VectorIndex;
use reporag_core::types::{
    Document, Filter, IndexedDocument, ScoredDocument, FIELD_DOC_TYPE, FIELD_REPO_NAME,
};

use crate::{check_dim, cosine_similarity, rank, Ranked};

/// Process-lifetime index kept entirely in memory; brute-force cosine search.
///
/// Rows live in insertion order behind a single lock, so an upserted batch
/// becomes visible to readers all at once.
pub struct MemoryIndex {
    dim: usize,
    rows: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, rows: RwLock::new(Vec::new()) }
    }
}

fn payload_strings(doc: &Document, field: &str) -> Vec<String> {
    match field {
        FIELD_REPO_NAME => vec![doc.repo_name.clone()],
        FIELD_DOC_TYPE => vec![doc.doc_type.clone()],
        key => match doc.metadata.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        },
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, repo_name: &str, documents: Vec<IndexedDocument>) -> Result<usize> {
        for d in &documents {
            check_dim(self.dim, &d.vector)?;
        }
        let n = documents.len();
        let mut rows = self.rows.write().await;
        rows.extend(documents.into_iter().map(|d| {
            let mut doc = d.document;
            doc.repo_name = repo_name.to_string();
            (doc, d.vector)
        }));
        tracing::debug!(repo = repo_name, inserted = n, total = rows.len(), "memory upsert");
        Ok(n)
    }

    async fn similarity_search(
        &self,
        vector: &[f32],
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        check_dim(self.dim, vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let rows = self.rows.read().await;
        let hits = rows
            .iter()
            .enumerate()
            .filter(|(_, (doc, _))| filter.matches(doc))
            .map(|(order, (doc, v))| Ranked {
                document: doc.clone(),
                score: cosine_similarity(vector, v),
                order,
            })
            .collect();
        Ok(rank(hits, top_k))
    }

    async fn delete_by_repo(&self, repo_name: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(doc, _)| doc.repo_name != repo_name);
        tracing::debug!(repo = repo_name, deleted = before - rows.len(), "memory delete");
        Ok(())
    }

    async fn list_distinct(&self, field: &str) -> Result<BTreeSet<String>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().flat_map(|(doc, _)| payload_strings(doc, field)).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<usize> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|(doc, _)| filter.matches(doc)).count())
    }
}
