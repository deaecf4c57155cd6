use arrow_array::cast::AsArray;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};

use reporag_core::error::{Error, Result};
use reporag_core::types::{Document, Metadata};

use crate::schema::{
    COL_BATCH_POS, COL_CONTENT, COL_DOC_TYPE, COL_ID, COL_INSERTED_AT, COL_METADATA, COL_REPO_NAME,
    COL_VECTOR,
};

/// A decoded table row. `vector` and `distance` are present only when the
/// query returned those columns.
pub(crate) struct Row {
    pub(crate) document: Document,
    pub(crate) order: (i64, i32),
    pub(crate) vector: Option<Vec<f32>>,
    pub(crate) distance: Option<f32>,
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Unavailable(format!("lancedb: column {name} missing or mistyped")))
}

pub(crate) fn decode_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let ids = column::<StringArray>(batch, COL_ID)?;
    let repos = column::<StringArray>(batch, COL_REPO_NAME)?;
    let doc_types = column::<StringArray>(batch, COL_DOC_TYPE)?;
    let contents = column::<StringArray>(batch, COL_CONTENT)?;
    let metadata = column::<StringArray>(batch, COL_METADATA)?;
    let inserted = column::<TimestampMicrosecondArray>(batch, COL_INSERTED_AT)?;
    let positions = column::<Int32Array>(batch, COL_BATCH_POS)?;
    let vectors = column::<FixedSizeListArray>(batch, COL_VECTOR).ok();
    let distances = column::<Float32Array>(batch, "_distance").ok();

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let meta: Metadata = serde_json::from_str(metadata.value(i)).map_err(|e| {
            Error::Unavailable(format!("lancedb: corrupt metadata for {}: {e}", ids.value(i)))
        })?;
        let vector = vectors.filter(|v| v.is_valid(i)).map(|v| {
            v.value(i).as_primitive::<arrow_array::types::Float32Type>().values().to_vec()
        });
        rows.push(Row {
            document: Document {
                id: ids.value(i).to_string(),
                repo_name: repos.value(i).to_string(),
                doc_type: doc_types.value(i).to_string(),
                content: contents.value(i).to_string(),
                metadata: meta,
            },
            order: (inserted.value(i), positions.value(i)),
            vector,
            distance: distances.filter(|d| d.is_valid(i)).map(|d| d.value(i)),
        });
    }
    Ok(rows)
}
