//! Firestore backend over the REST API.

pub mod client;
pub mod convert;
pub mod query;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use query::{split_filter, FilterSplit, FirestoreQuery};
pub use retry::RetryConfig;
pub use store::FirestoreStore;
pub use token_cache::TokenSource;
