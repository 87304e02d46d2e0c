//! Query-string to collection query translation.
//!
//! A [`QueryRequest`] is turned into a [`QueryPlan`] of filter, sort,
//! projection, text search and pagination directives, which is then fed to
//! any [`QueryHandle`] in that order.
//!
//! ```
//! use jobboard_query::{QueryPlan, QueryRequest, SortKey};
//!
//! let request = QueryRequest::parse("salary[gte]=50000&sort=-salary&limit=2");
//! let plan = QueryPlan::from_request(&request);
//! assert_eq!(plan.sort, vec![SortKey::desc("salary")]);
//! assert_eq!(plan.window.map(|w| w.limit), Some(2));
//! ```

pub mod eval;
pub mod filter;
pub mod handle;
pub mod plan;
pub mod request;

pub use filter::{build_filter, Comparator, FilterExpression, Operand, Predicate};
pub use handle::QueryHandle;
pub use plan::{
    PlanDefaults, Projection, QueryPlan, SortDirection, SortKey, TextPredicate, Window,
    DEFAULT_LIMIT, DEFAULT_PAGE, ID_FIELD, VERSION_FIELD,
};
pub use request::{QueryRequest, QueryValue};

/// Stored document as a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Control parameters that never become filter predicates.
pub const RESERVED_KEYS: [&str; 5] = ["sort", "fields", "q", "limit", "page"];
