//! Vector index backends.
//!
//! [`MemoryIndex`] is the zero-configuration default and lives for the
//! process. [`LanceIndex`] persists to a local LanceDB directory or a hosted
//! `db://` database. Both implement [`reporag_core::traits::VectorIndex`].

use std::sync::Arc;

use reporag_core::config::{IndexBackend, IndexSettings};
use reporag_core::error::{Error, Result};
use reporag_core::traits::VectorIndex;
use reporag_core::types::{Document, ScoredDocument};

pub mod lance;
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Open the backend selected by configuration.
pub async fn open_index(settings: &IndexSettings, dim: usize) -> Result<Arc<dyn VectorIndex>> {
    match settings.backend {
        IndexBackend::Memory => {
            tracing::info!(dim, "using in-memory vector index");
            Ok(Arc::new(MemoryIndex::new(dim)))
        }
        IndexBackend::Lance => {
            let uri = settings
                .uri
                .as_deref()
                .ok_or_else(|| {
                    Error::InvalidConfig("index.uri is required for the lance backend".into())
                })?;
            let index =
                LanceIndex::open(uri, settings.api_key.as_deref(), &settings.table, dim).await?;
            Ok(Arc::new(index))
        }
    }
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// A candidate with its position in insertion order.
pub(crate) struct Ranked<K: Ord> {
    pub(crate) document: Document,
    pub(crate) score: f32,
    pub(crate) order: K,
}

/// Sort best-first, equal scores by insertion order, and keep `top_k`.
pub(crate) fn rank<K: Ord>(mut hits: Vec<Ranked<K>>, top_k: usize) -> Vec<ScoredDocument> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.order.cmp(&b.order)));
    hits.truncate(top_k);
    hits.into_iter().map(|h| ScoredDocument { document: h.document, score: h.score }).collect()
}

/// Scores closer than this count as equal when deciding where `top_k` cuts.
const TIE_EPSILON: f32 = 1e-6;

/// True when the hit just past `top_k` scores the same as the last kept one,
/// so which of the tied rows survive depends on the candidate set.
pub(crate) fn tie_at_cutoff<K: Ord>(hits: &[Ranked<K>], top_k: usize) -> bool {
    if top_k == 0 || hits.len() <= top_k {
        return false;
    }
    let mut scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    (scores[top_k - 1] - scores[top_k]).abs() <= TIE_EPSILON
}

pub(crate) fn check_dim(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, actual: vector.len() })
    }
}
