use std::collections::BTreeSet;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use serde_json::Value;

use reporag_core::error::{Error, Result};
use reporag_core::traits::VectorIndex;
use reporag_core::types::{Filter, IndexedDocument, Metadata, ScoredDocument, RESERVED_FIELDS};

use crate::schema::{COL_METADATA, PAYLOAD_COLUMNS};
use crate::search::{decode_rows, Row};
use crate::table::{column_predicate, ensure_table, open_db, sql_quote, store_err};
use crate::writer::documents_to_record_batch;
use crate::{check_dim, cosine_similarity, rank, tie_at_cutoff, Ranked};

/// LanceDB-backed index. Works against a local directory or a hosted
/// database; every store failure maps to `Error::Unavailable`.
pub struct LanceIndex {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceIndex {
    pub async fn open(
        uri: &str,
        api_key: Option<&str>,
        table_name: &str,
        dim: usize,
    ) -> Result<Self> {
        let db = open_db(uri, api_key).await?;
        ensure_table(&db, table_name, dim).await?;
        tracing::info!(uri, table = table_name, dim, "opened lancedb vector index");
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    async fn table(&self) -> Result<Table> {
        self.db.open_table(&self.table_name).execute().await.map_err(store_err)
    }

    async fn collect(query: impl ExecutableQuery) -> Result<Vec<RecordBatch>> {
        query.execute().await.map_err(store_err)?.try_collect().await.map_err(store_err)
    }

    /// LanceDB cosine KNN over rows matching the column predicate.
    async fn knn(
        &self,
        vector: &[f32],
        predicate: Option<String>,
        limit: usize,
    ) -> Result<Vec<Ranked<(i64, i32)>>> {
        let table = self.table().await?;
        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(store_err)?
            .distance_type(DistanceType::Cosine)
            .limit(limit);
        if let Some(p) = predicate {
            query = query.only_if(p);
        }
        let mut hits = Vec::new();
        for batch in Self::collect(query).await? {
            for row in decode_rows(&batch)? {
                let score = 1.0 - row.distance.unwrap_or(1.0);
                hits.push(Ranked { document: row.document, score, order: row.order });
            }
        }
        Ok(hits)
    }

    /// Every row matching `filter`, scored in process. Exact, and independent
    /// of how LanceDB splits a top-k across fragments.
    async fn scan_scored(
        &self,
        vector: &[f32],
        filter: &Filter,
        predicate: Option<String>,
    ) -> Result<Vec<Ranked<(i64, i32)>>> {
        Ok(self
            .scan(predicate, true)
            .await?
            .into_iter()
            .filter(|row| filter.matches(&row.document))
            .map(|row| {
                let score = row.vector.as_deref().map_or(0.0, |v| cosine_similarity(vector, v));
                Ranked { document: row.document, score, order: row.order }
            })
            .collect())
    }

    /// Full scan of rows matching the column predicate.
    async fn scan(&self, predicate: Option<String>, with_vectors: bool) -> Result<Vec<Row>> {
        let table = self.table().await?;
        let mut query = table.query();
        if !with_vectors {
            query = query.select(Select::columns(&PAYLOAD_COLUMNS));
        }
        if let Some(p) = predicate {
            query = query.only_if(p);
        }
        let mut rows = Vec::new();
        for batch in Self::collect(query).await? {
            rows.extend(decode_rows(&batch)?);
        }
        Ok(rows)
    }
}

fn metadata_strings(meta: &Metadata, key: &str) -> Vec<String> {
    match meta.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => {
            items.iter().filter_map(Value::as_str).map(str::to_string).collect()
        }
        _ => Vec::new(),
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, repo_name: &str, documents: Vec<IndexedDocument>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let inserted_at = Utc::now().timestamp_micros();
        let batch = documents_to_record_batch(&documents, repo_name, self.dim, inserted_at)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema));
        // a single add is one table version: readers see all rows or none
        self.table().await?.add(reader).execute().await.map_err(store_err)?;
        tracing::debug!(repo = repo_name, inserted = documents.len(), "lancedb upsert");
        Ok(documents.len())
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
        let (predicate, has_metadata) = column_predicate(filter);
        if has_metadata {
            let hits = self.scan_scored(vector, filter, predicate).await?;
            return Ok(rank(hits, top_k));
        }

        // one extra row shows whether a run of equal scores crosses the cutoff
        let hits = self.knn(vector, predicate.clone(), top_k.saturating_add(1)).await?;
        if tie_at_cutoff(&hits, top_k) {
            tracing::debug!(top_k, "equal scores at the cutoff; ranking by full scan");
            let hits = self.scan_scored(vector, filter, predicate).await?;
            return Ok(rank(hits, top_k));
        }
        Ok(rank(hits, top_k))
    }

    async fn delete_by_repo(&self, repo_name: &str) -> Result<()> {
        let predicate = format!("repo_name = {}", sql_quote(repo_name));
        self.table().await?.delete(&predicate).await.map_err(store_err)?;
        tracing::debug!(repo = repo_name, "lancedb delete");
        Ok(())
    }

    async fn list_distinct(&self, field: &str) -> Result<BTreeSet<String>> {
        let table = self.table().await?;
        let column_name = if RESERVED_FIELDS.contains(&field) { field } else { COL_METADATA };
        let query = table.query().select(Select::columns(&[column_name]));
        let mut out = BTreeSet::new();
        for batch in Self::collect(query).await? {
            let col = batch
                .column_by_name(column_name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| {
                    Error::Unavailable(format!("lancedb: column {column_name} missing"))
                })?;
            for value in col.iter().flatten() {
                if column_name == COL_METADATA {
                    let meta: Metadata = serde_json::from_str(value).map_err(store_err)?;
                    out.extend(metadata_strings(&meta, field));
                } else {
                    out.insert(value.to_string());
                }
            }
        }
        Ok(out)
    }

    async fn count(&self, filter: &Filter) -> Result<usize> {
        let (predicate, has_metadata) = column_predicate(filter);
        if has_metadata {
            let rows = self.scan(predicate, false).await?;
            return Ok(rows.iter().filter(|r| filter.matches(&r.document)).count());
        }
        self.table().await?.count_rows(predicate).await.map_err(store_err)
    }
}
