//! Backend-neutral document store interface.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use jobboard_query::{Document, QueryPlan, ID_FIELD, VERSION_FIELD};

use crate::error::{StoreError, StoreResult};
use crate::schema::CollectionSchema;

/// Persistence for JSON documents keyed by `_id`.
///
/// Every document carries a `__v` counter: zero on insert, incremented on
/// each replace. Replacing requires the caller's `__v` to match the stored
/// one, so a read-modify-write over a stale copy fails instead of
/// overwriting a newer version.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and metrics.
    fn backend(&self) -> &'static str;

    /// Insert a new document. Fails on an existing `_id` or a taken unique field.
    async fn insert(&self, schema: &CollectionSchema, document: Document) -> StoreResult<Document>;

    async fn get(&self, schema: &CollectionSchema, id: &str) -> StoreResult<Option<Document>>;

    /// Overwrite an existing document whose stored `__v` equals the given one.
    /// A mismatch fails with [`StoreError::Conflict`].
    async fn replace(&self, schema: &CollectionSchema, document: Document) -> StoreResult<Document>;

    /// Delete by id, reporting whether a document was removed.
    async fn delete(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool>;

    /// Run a query plan over the collection.
    async fn find(&self, schema: &CollectionSchema, plan: &QueryPlan) -> StoreResult<Vec<Document>>;

    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// `_id` of a document.
pub fn document_id(document: &Document) -> StoreResult<&str> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::invalid_document("missing _id"))
}

/// `__v` of a document, zero when absent.
pub fn document_version(document: &Document) -> u64 {
    document
        .get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .unwrap_or_default()
}

/// Fails with `Conflict` unless `candidate` was read at the stored version.
pub(crate) fn check_version(
    schema: &CollectionSchema,
    stored: &Document,
    candidate: &Document,
    id: &str,
) -> StoreResult<()> {
    if document_version(stored) == document_version(candidate) {
        Ok(())
    } else {
        Err(StoreError::conflict(format!("{}/{}", schema.name, id)))
    }
}

pub(crate) fn set_version(document: &mut Document, version: u64) {
    document.insert(VERSION_FIELD.to_string(), Value::from(version));
}

/// Serialize a model into a document.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid_document(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a model from a document.
pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
