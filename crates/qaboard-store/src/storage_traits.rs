//! Storage trait definitions for qaboard
//!
//! `DocumentStore` is the narrow capability surface the board needs from a
//! remote document database:
//! - fetch one document by id, or every document of a collection
//! - follow a document reference embedded in another document
//! - add a document (the store assigns the id) and patch an existing one
//!
//! All methods are async and backend-agnostic. Nothing retries internally;
//! failures are returned to the caller. An in-memory fake lives in the
//! `fakes` module and a SurrealDB backend in `surreal_store`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Field map of a single document.
pub type DocumentData = Map<String, Value>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    /// Generate a fresh random id (UUID v4, no hyphens).
    pub fn generate() -> Self {
        DocumentId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId(s)
    }
}

/// Reference handle to a document: usable both to re-fetch the document and
/// to embed as a foreign-key-style field value in another document.
///
/// Embedded form is `{"collection": "...", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub collection: String,
    pub id: DocumentId,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Embeddable field value for this reference.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "collection": self.collection,
            "id": self.id.as_str(),
        })
    }

    /// Parse an embedded reference field value.
    pub fn from_value(value: &Value) -> StorageResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| StorageError::InvalidReference(value.to_string()))?;
        match (
            obj.get("collection").and_then(Value::as_str),
            obj.get("id").and_then(Value::as_str),
        ) {
            (Some(collection), Some(id)) if !collection.is_empty() && !id.is_empty() => {
                Ok(DocumentRef::new(collection, id))
            }
            _ => Err(StorageError::InvalidReference(value.to_string())),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A fetched document: its reference plus its field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub reference: DocumentRef,
    pub data: DocumentData,
}

impl Document {
    pub fn new(reference: DocumentRef, data: DocumentData) -> Self {
        Self { reference, data }
    }

    pub fn id(&self) -> &DocumentId {
        &self.reference.id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// String field, `None` if absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// A single field update inside a [`DocumentPatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the field.
    Set(Value),
    /// Append each value not already present in the array field. A missing
    /// or non-array field is replaced by a fresh array.
    ArrayUnion(Vec<Value>),
}

/// Ordered set of field updates applied to one document.
///
/// Application is shared by every backend so `ArrayUnion` behaves the same
/// everywhere: re-applying the same union is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    updates: Vec<(String, FieldUpdate)>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates
            .push((field.into(), FieldUpdate::Set(value.into())));
        self
    }

    pub fn array_union(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.updates.push((
            field.into(),
            FieldUpdate::ArrayUnion(values.into_iter().collect()),
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn updates(&self) -> &[(String, FieldUpdate)] {
        &self.updates
    }

    /// Apply every update in order to `data`.
    pub fn apply(&self, data: &mut DocumentData) {
        for (field, update) in &self.updates {
            match update {
                FieldUpdate::Set(value) => {
                    data.insert(field.clone(), value.clone());
                }
                FieldUpdate::ArrayUnion(values) => {
                    let slot = data
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(items) = slot {
                        for value in values {
                            if !items.contains(value) {
                                items.push(value.clone());
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Remote document database client.
///
/// Guarantees:
/// - `get_document` / `resolve_reference` return `Ok(None)` for a missing
///   document; absence is never reported as an error.
/// - `list_documents` is a snapshot at call time with no ordering guarantee.
/// - `add_document` assigns a fresh id and returns a reference that
///   `resolve_reference` can follow.
/// - `update_document` fails with `StorageError::NotFound` when the target
///   document does not exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by collection and id.
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<Document>>;

    /// Fetch every document of a collection.
    async fn list_documents(&self, collection: &str) -> StorageResult<Vec<Document>>;

    /// Follow a reference handle.
    async fn resolve_reference(&self, reference: &DocumentRef) -> StorageResult<Option<Document>> {
        self.get_document(&reference.collection, &reference.id)
            .await
    }

    /// Create a document with a store-assigned id.
    async fn add_document(&self, collection: &str, data: DocumentData)
        -> StorageResult<DocumentRef>;

    /// Apply a patch to an existing document.
    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> StorageResult<()>;
}
