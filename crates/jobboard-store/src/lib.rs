//! Document persistence for the job board.
//!
//! Provides:
//! - A backend-neutral [`DocumentStore`] trait over JSON documents
//! - [`MemoryStore`], evaluating query plans in-process
//! - [`FirestoreStore`], pushing what it can into Firestore structured queries
//! - Typed [`JobRepository`] and [`UserRepository`] on top of either

pub mod error;
pub mod firestore;
pub mod memory;
pub mod metrics;
pub mod repos;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreStore};
pub use memory::{MemoryQuery, MemoryStore};
pub use repos::{JobRepository, UserRepository};
pub use schema::{CollectionSchema, FieldKind, JOBS, USERS};
pub use store::{document_id, document_version, from_document, to_document, DocumentStore};
