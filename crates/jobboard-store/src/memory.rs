//! In-process document store.
//!
//! Collections are insertion-ordered vectors behind a `tokio::sync::RwLock`;
//! queries snapshot the collection and evaluate the whole plan in-process.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info_span, Instrument};

use jobboard_query::{
    eval, Document, FilterExpression, Projection, QueryHandle, QueryPlan, SortKey, TextPredicate,
    Window,
};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::schema::CollectionSchema;
use crate::store::{check_version, document_id, document_version, set_version, DocumentStore};

const BACKEND: &str = "memory";

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, schema: &CollectionSchema) -> usize {
        self.collections
            .read()
            .await
            .get(schema.name)
            .map_or(0, Vec::len)
    }

    /// Query handle over a snapshot of the collection.
    pub async fn query(&self, schema: &CollectionSchema) -> MemoryQuery {
        let documents = self
            .collections
            .read()
            .await
            .get(schema.name)
            .cloned()
            .unwrap_or_default();
        MemoryQuery::new(documents, schema.text_fields)
    }

    async fn execute<T, F>(&self, operation: &str, schema: &CollectionSchema, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = info_span!("store_request", backend = BACKEND, operation = %operation, collection = %schema.name);
        let start = Instant::now();
        let result = fut.instrument(span).await;
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(BACKEND, operation, status, start.elapsed().as_millis() as f64);
        result
    }
}

/// Fails if another document already holds one of the schema's unique values.
fn check_unique(
    schema: &CollectionSchema,
    existing: &[Document],
    candidate: &Document,
    id: &str,
) -> StoreResult<()> {
    for field in schema.unique_fields {
        let Some(value) = candidate.get(*field) else {
            continue;
        };
        let taken = existing
            .iter()
            .any(|doc| doc.get(*field) == Some(value) && document_id(doc).ok() != Some(id));
        if taken {
            return Err(StoreError::duplicate(*field));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, schema: &CollectionSchema, mut document: Document) -> StoreResult<Document> {
        self.execute("insert", schema, async {
            let id = document_id(&document)?.to_string();
            let mut collections = self.collections.write().await;
            let collection = collections.entry(schema.name).or_default();

            if collection.iter().any(|doc| document_id(doc).ok() == Some(id.as_str())) {
                return Err(StoreError::AlreadyExists(format!("{}/{}", schema.name, id)));
            }
            check_unique(schema, collection, &document, &id)?;

            set_version(&mut document, 0);
            collection.push(document.clone());
            debug!(collection = schema.name, id = %id, "Inserted document");
            Ok(document)
        })
        .await
    }

    async fn get(&self, schema: &CollectionSchema, id: &str) -> StoreResult<Option<Document>> {
        self.execute("get", schema, async {
            let collections = self.collections.read().await;
            Ok(collections.get(schema.name).and_then(|collection| {
                collection
                    .iter()
                    .find(|doc| document_id(doc).ok() == Some(id))
                    .cloned()
            }))
        })
        .await
    }

    async fn replace(&self, schema: &CollectionSchema, mut document: Document) -> StoreResult<Document> {
        self.execute("replace", schema, async {
            let id = document_id(&document)?.to_string();
            let mut collections = self.collections.write().await;
            let collection = collections.entry(schema.name).or_default();
            check_unique(schema, collection, &document, &id)?;

            let slot = collection
                .iter_mut()
                .find(|doc| document_id(doc).ok() == Some(id.as_str()))
                .ok_or_else(|| StoreError::not_found(format!("{}/{}", schema.name, id)))?;
            check_version(schema, slot, &document, &id)?;

            let version = document_version(slot) + 1;
            set_version(&mut document, version);
            *slot = document.clone();
            Ok(document)
        })
        .await
    }

    async fn delete(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        self.execute("delete", schema, async {
            let mut collections = self.collections.write().await;
            let Some(collection) = collections.get_mut(schema.name) else {
                return Ok(false);
            };
            let before = collection.len();
            collection.retain(|doc| document_id(doc).ok() != Some(id));
            Ok(collection.len() != before)
        })
        .await
    }

    async fn find(&self, schema: &CollectionSchema, plan: &QueryPlan) -> StoreResult<Vec<Document>> {
        self.execute("find", schema, async {
            let query = self.query(schema).await;
            plan.apply(query).execute().await
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Query over a collection snapshot, evaluated entirely in-process.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    documents: Vec<Document>,
    text_fields: &'static [&'static str],
    plan: QueryPlan,
}

impl MemoryQuery {
    pub fn new(documents: Vec<Document>, text_fields: &'static [&'static str]) -> Self {
        Self {
            documents,
            text_fields,
            plan: QueryPlan::new(),
        }
    }
}

#[async_trait]
impl QueryHandle for MemoryQuery {
    type Error = StoreError;

    fn filter(mut self, filter: &FilterExpression) -> Self {
        self.plan = self.plan.with_filter(filter.clone());
        self
    }

    fn sort(mut self, keys: &[SortKey]) -> Self {
        self.plan = self.plan.with_sort(keys.to_vec());
        self
    }

    fn select(mut self, projection: &Projection) -> Self {
        self.plan = self.plan.with_projection(projection.clone());
        self
    }

    fn text_search(mut self, text: &TextPredicate) -> Self {
        self.plan = self.plan.with_text(text.clone());
        self
    }

    fn skip_limit(mut self, skip: u64, limit: u64) -> Self {
        self.plan = self.plan.with_window(Window { skip, limit });
        self
    }

    async fn execute(self) -> Result<Vec<Document>, Self::Error> {
        Ok(eval::execute_plan(&self.plan, self.documents, self.text_fields))
    }
}
