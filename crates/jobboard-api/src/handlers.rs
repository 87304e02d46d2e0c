//! Request handlers.

use axum::extract::FromRequest;

use crate::error::ApiError;

pub mod auth;
pub mod health;
pub mod jobs;
pub mod users;

pub use auth::*;
pub use health::*;
pub use jobs::*;
pub use users::*;

/// JSON body whose rejections render as [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Raw query string as parsed by the query translator.
pub(crate) fn query_request(raw: Option<String>) -> jobboard_query::QueryRequest {
    jobboard_query::QueryRequest::parse(raw.as_deref().unwrap_or_default())
}
