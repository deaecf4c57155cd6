use arrow_array::{
    FixedSizeListArray, Int32Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use std::sync::Arc;

use reporag_core::error::{Error, Result};
use reporag_core::types::IndexedDocument;

use crate::schema::build_arrow_schema;

/// Build one Arrow batch for `docs`, stamping every row with `repo_name` and
/// the shared insertion timestamp. Row order is preserved in `batch_pos`.
pub fn documents_to_record_batch(
    docs: &[IndexedDocument],
    repo_name: &str,
    dim: usize,
    inserted_at: i64,
) -> Result<RecordBatch> {
    let dim_i32 = i32::try_from(dim)
        .map_err(|_| Error::InvalidConfig(format!("dimension {dim} too large")))?;
    let schema = build_arrow_schema(dim_i32);

    let mut metadata = Vec::with_capacity(docs.len());
    let mut positions = Vec::with_capacity(docs.len());
    for (i, d) in docs.iter().enumerate() {
        if d.vector.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: d.vector.len() });
        }
        let meta = serde_json::to_string(&d.document.metadata)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        metadata.push(meta);
        positions
            .push(i32::try_from(i).map_err(|_| Error::InvalidInput("batch too large".into()))?);
    }

    let ids = StringArray::from_iter_values(docs.iter().map(|d| d.document.id.as_str()));
    let repos = StringArray::from_iter_values(docs.iter().map(|_| repo_name));
    let doc_types =
        StringArray::from_iter_values(docs.iter().map(|d| d.document.doc_type.as_str()));
    let contents = StringArray::from_iter_values(docs.iter().map(|d| d.document.content.as_str()));
    let vectors = FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
        docs.iter().map(|d| Some(d.vector.iter().copied().map(Some).collect::<Vec<_>>())),
        dim_i32,
    );

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(repos),
            Arc::new(doc_types),
            Arc::new(contents),
            Arc::new(StringArray::from(metadata)),
            Arc::new(TimestampMicrosecondArray::from(vec![inserted_at; docs.len()])),
            Arc::new(Int32Array::from(positions)),
            Arc::new(vectors),
        ],
    )
    .map_err(|e| Error::InvalidInput(format!("Failed to create record batch: {e}")))
}
