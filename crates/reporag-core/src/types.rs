//! Domain types used by the embedder, the vector index and the retriever.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type DocId = String;

/// Open-ended payload metadata: string keys to scalar or list values.
pub type Metadata = serde_json::Map<String, Value>;

pub const FIELD_REPO_NAME: &str = "repo_name";
pub const FIELD_DOC_TYPE: &str = "doc_type";
pub const FIELD_CONTENT: &str = "content";

/// Payload keys owned by the index; never surfaced as metadata.
pub const RESERVED_FIELDS: [&str; 3] = [FIELD_CONTENT, FIELD_DOC_TYPE, FIELD_REPO_NAME];

/// Well-known `doc_type` values produced by the document source. The set is
/// open: the index treats `doc_type` as an opaque string.
pub mod doc_types {
    pub const README: &str = "readme";
    pub const README_FULL: &str = "readme_full";
    pub const METADATA: &str = "metadata";
    pub const FILE_TREE: &str = "file_tree";
    pub const ISSUE: &str = "issue";
    pub const UNKNOWN: &str = "unknown";
}

fn unknown_doc_type() -> String {
    doc_types::UNKNOWN.to_string()
}

/// An already-chunked fragment as handed over by the document source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub content: String,
    #[serde(rename = "type", default = "unknown_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SourceDocument {
    pub fn new(content: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self { content: content.into(), doc_type: doc_type.into(), metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A stored fragment. `id` is assigned at ingestion and never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub repo_name: String,
    pub doc_type: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    /// Build a stored document from a source fragment. Metadata keys that
    /// collide with reserved payload fields are removed and returned.
    pub fn from_source(id: DocId, repo_name: &str, source: SourceDocument) -> (Self, Vec<String>) {
        let SourceDocument { content, doc_type, mut metadata } = source;
        let dropped = strip_reserved(&mut metadata);
        let doc = Self { id, repo_name: repo_name.to_string(), doc_type, content, metadata };
        (doc, dropped)
    }
}

/// Remove reserved keys from `metadata`, returning the names that were present.
pub fn strip_reserved(metadata: &mut Metadata) -> Vec<String> {
    RESERVED_FIELDS
        .iter()
        .filter(|k| metadata.remove(**k).is_some())
        .map(|k| (*k).to_string())
        .collect()
}

/// A document together with the embedding of its `content`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// A search hit as returned by a vector index. Higher score is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// A single equality constraint over a payload field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub key: String,
    pub value: Value,
}

impl FieldCondition {
    pub fn matches(&self, doc: &Document) -> bool {
        match self.key.as_str() {
            FIELD_REPO_NAME => self.value.as_str() == Some(doc.repo_name.as_str()),
            FIELD_DOC_TYPE => self.value.as_str() == Some(doc.doc_type.as_str()),
            FIELD_CONTENT => self.value.as_str() == Some(doc.content.as_str()),
            key => doc.metadata.get(key).is_some_and(|stored| value_matches(stored, &self.value)),
        }
    }

    /// True when the key is a first-class payload field rather than metadata.
    pub fn is_reserved(&self) -> bool {
        RESERVED_FIELDS.contains(&self.key.as_str())
    }
}

/// Equality on scalars; on list-valued fields the list must contain the value.
pub fn value_matches(stored: &Value, wanted: &Value) -> bool {
    if stored == wanted {
        return true;
    }
    match stored {
        Value::Array(items) => items.contains(wanted),
        _ => false,
    }
}

/// AND of equality constraints over payload fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<FieldCondition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter scoped to a single repository namespace.
    pub fn repo(repo_name: &str) -> Self {
        Self::new().eq(FIELD_REPO_NAME, repo_name)
    }

    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(FieldCondition { key: key.into(), value: value.into() });
        self
    }

    #[must_use]
    pub fn doc_type(self, doc_type: Option<&str>) -> Self {
        match doc_type {
            Some(t) => self.eq(FIELD_DOC_TYPE, t),
            None => self,
        }
    }

    pub fn conditions(&self) -> &[FieldCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// What the retriever hands back to callers.
///
/// `metadata` carries every payload key except `content`, `doc_type` and
/// `repo_name`. `is_parent` marks a broader document appended for context
/// rather than matched directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub score: f32,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_parent: bool,
}

impl From<ScoredDocument> for SearchResult {
    fn from(hit: ScoredDocument) -> Self {
        let ScoredDocument { document, score } = hit;
        let mut metadata = document.metadata;
        strip_reserved(&mut metadata);
        Self {
            content: document.content,
            doc_type: document.doc_type,
            score,
            metadata,
            is_parent: false,
        }
    }
}
