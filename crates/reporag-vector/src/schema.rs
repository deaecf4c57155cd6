use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_REPO_NAME: &str = "repo_name";
pub const COL_DOC_TYPE: &str = "doc_type";
pub const COL_CONTENT: &str = "content";
/// Open-ended metadata, stored as a JSON object string.
pub const COL_METADATA: &str = "metadata";
pub const COL_INSERTED_AT: &str = "inserted_at";
pub const COL_BATCH_POS: &str = "batch_pos";
pub const COL_VECTOR: &str = "vector";

/// Every column except the vector; used for payload-only scans.
pub const PAYLOAD_COLUMNS: [&str; 7] = [
    COL_ID,
    COL_REPO_NAME,
    COL_DOC_TYPE,
    COL_CONTENT,
    COL_METADATA,
    COL_INSERTED_AT,
    COL_BATCH_POS,
];

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    let item = Arc::new(Field::new("item", DataType::Float32, true));
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_REPO_NAME, DataType::Utf8, false),
        Field::new(COL_DOC_TYPE, DataType::Utf8, false),
        Field::new(COL_CONTENT, DataType::Utf8, false),
        Field::new(COL_METADATA, DataType::Utf8, false),
        Field::new(COL_INSERTED_AT, DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new(COL_BATCH_POS, DataType::Int32, false),
        Field::new(COL_VECTOR, DataType::FixedSizeList(item, dim), false),
    ]))
}

/// Dimensionality of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(COL_VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
