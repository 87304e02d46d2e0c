//! [`DocumentStore`] backed by Firestore.

use async_trait::async_trait;
use tracing::debug;

use jobboard_query::{Document, QueryHandle, QueryPlan};

use super::client::FirestoreClient;
use super::convert::{document_to_json, fields_from_json, value_from_json};
use super::query::FirestoreQuery;
use super::types::{CollectionSelector, Filter, StructuredQuery};
use crate::error::{StoreError, StoreResult};
use crate::schema::{CollectionSchema, JOBS};
use crate::store::{check_version, document_id, document_version, set_version, DocumentStore};

/// Firestore-backed store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: FirestoreClient,
}

impl FirestoreStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env()?))
    }

    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }

    /// Fails if a different document already holds one of the unique values.
    async fn check_unique(&self, schema: &CollectionSchema, candidate: &Document, id: &str) -> StoreResult<()> {
        for field in schema.unique_fields {
            let Some(value) = candidate.get(*field) else {
                continue;
            };
            let query = StructuredQuery {
                from: vec![CollectionSelector {
                    collection_id: schema.name.to_string(),
                    all_descendants: None,
                }],
                r#where: Some(Filter::field(
                    *field,
                    "EQUAL",
                    value_from_json(value, schema.kind_of(field)),
                )),
                limit: Some(2),
                ..StructuredQuery::default()
            };
            let matches = self
                .client
                .with_retry("check_unique", || self.client.run_query(schema.name, query.clone()))
                .await?;
            let taken = matches
                .into_iter()
                .map(document_to_json)
                .any(|doc| document_id(&doc).ok() != Some(id));
            if taken {
                return Err(StoreError::duplicate(*field));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    async fn insert(&self, schema: &CollectionSchema, mut document: Document) -> StoreResult<Document> {
        let id = document_id(&document)?.to_string();
        self.check_unique(schema, &document, &id).await?;

        set_version(&mut document, 0);
        let fields = fields_from_json(&document, schema);
        self.client
            .with_retry("create_document", || {
                self.client.create_document(schema.name, &id, fields.clone())
            })
            .await?;
        debug!(collection = schema.name, id = %id, "Inserted document");
        Ok(document)
    }

    async fn get(&self, schema: &CollectionSchema, id: &str) -> StoreResult<Option<Document>> {
        let document = self
            .client
            .with_retry("get_document", || self.client.get_document(schema.name, id))
            .await?;
        Ok(document.map(document_to_json))
    }

    async fn replace(&self, schema: &CollectionSchema, mut document: Document) -> StoreResult<Document> {
        let id = document_id(&document)?.to_string();
        let existing = self
            .client
            .with_retry("get_document", || self.client.get_document(schema.name, &id))
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", schema.name, id)))?;
        let update_time = existing.update_time.clone();
        let stored = document_to_json(existing);
        check_version(schema, &stored, &document, &id)?;
        self.check_unique(schema, &document, &id).await?;

        set_version(&mut document, document_version(&stored) + 1);
        let fields = fields_from_json(&document, schema);
        self.client
            .with_retry("replace_document", || {
                self.client
                    .replace_document(schema.name, &id, fields.clone(), update_time.as_deref())
            })
            .await?;
        Ok(document)
    }

    async fn delete(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        if self.get(schema, id).await?.is_none() {
            return Ok(false);
        }
        self.client
            .with_retry("delete_document", || self.client.delete_document(schema.name, id))
            .await?;
        Ok(true)
    }

    async fn find(&self, schema: &CollectionSchema, plan: &QueryPlan) -> StoreResult<Vec<Document>> {
        plan.apply(FirestoreQuery::new(self.client.clone(), *schema))
            .execute()
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client.list_documents(JOBS.name, Some(1), None).await?;
        Ok(())
    }
}
