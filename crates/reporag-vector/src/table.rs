//! LanceDB connection and housekeeping helpers.
//!
//! Opens local or hosted databases, creates the documents table on first use,
//! and turns payload filters into SQL predicates for pushdown.

use arrow_array::{RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection, Table};
use serde_json::Value;

use reporag_core::error::{Error, Result};
use reporag_core::types::{FieldCondition, Filter};

use crate::schema::{build_arrow_schema, vector_dim};

pub(crate) fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Unavailable(format!("lancedb: {e}"))
}

pub async fn open_db(uri: &str, api_key: Option<&str>) -> Result<Connection> {
    #[allow(unused_mut)]
    let mut builder = connect(uri);
    if let Some(key) = api_key {
        #[cfg(feature = "remote")]
        {
            builder = builder.api_key(key);
        }
        #[cfg(not(feature = "remote"))]
        {
            let _ = key;
            return Err(Error::InvalidConfig(
                "index.api_key is set but reporag-vector was built without the `remote` feature"
                    .into(),
            ));
        }
    }
    builder.execute().await.map_err(store_err)
}

/// Open `name`, creating it empty when absent. An existing table whose vector
/// column has another dimensionality is a configuration error.
pub async fn ensure_table(conn: &Connection, name: &str, dim: usize) -> Result<Table> {
    let names = conn.table_names().execute().await.map_err(store_err)?;
    if !names.iter().any(|n| n == name) {
        let dim_i32 = i32::try_from(dim)
            .map_err(|_| Error::InvalidConfig(format!("dimension {dim} too large")))?;
        let schema = build_arrow_schema(dim_i32);
        let empty = RecordBatch::new_empty(schema.clone());
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(empty)], schema));
        conn.create_table(name, reader).execute().await.map_err(store_err)?;
        tracing::info!(table = name, dim, "created vector table");
    }
    let table = conn.open_table(name).execute().await.map_err(store_err)?;
    let schema = table.schema().await.map_err(store_err)?;
    match vector_dim(&schema) {
        Some(actual) if actual == dim => Ok(table),
        Some(actual) => Err(Error::DimensionMismatch { expected: dim, actual }),
        None => Err(Error::InvalidConfig(format!("table {name} has no vector column"))),
    }
}

pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// SQL predicate for the conditions on first-class columns, plus whether any
/// condition targets open metadata (which must be checked after decoding).
pub fn column_predicate(filter: &Filter) -> (Option<String>, bool) {
    let mut clauses = Vec::new();
    let mut has_metadata = false;
    for cond in filter.conditions() {
        if cond.is_reserved() {
            clauses.push(column_clause(cond));
        } else {
            has_metadata = true;
        }
    }
    let predicate = if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) };
    (predicate, has_metadata)
}

fn column_clause(cond: &FieldCondition) -> String {
    match &cond.value {
        Value::String(s) => format!("{} = {}", cond.key, sql_quote(s)),
        // reserved columns are strings; any other value can never match
        _ => "false".to_string(),
    }
}
