//! Builder-style collection query handle.

use async_trait::async_trait;

use crate::filter::FilterExpression;
use crate::plan::{Projection, SortKey, TextPredicate};
use crate::Document;

/// Collection query under construction.
///
/// Stores implement this for their native query type; [`QueryPlan::apply`]
/// drives it. Builder calls never fail, errors surface from `execute`.
///
/// [`QueryPlan::apply`]: crate::QueryPlan::apply
#[async_trait]
pub trait QueryHandle: Sized + Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn filter(self, filter: &FilterExpression) -> Self;

    fn sort(self, keys: &[SortKey]) -> Self;

    fn select(self, projection: &Projection) -> Self;

    fn text_search(self, text: &TextPredicate) -> Self;

    fn skip_limit(self, skip: u64, limit: u64) -> Self;

    async fn execute(self) -> Result<Vec<Document>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueryPlan, QueryRequest};

    /// Handle that records the builder calls it receives.
    #[derive(Default)]
    struct RecordingHandle {
        calls: Vec<String>,
    }

    #[async_trait]
    impl QueryHandle for RecordingHandle {
        type Error = std::io::Error;

        fn filter(mut self, filter: &FilterExpression) -> Self {
            self.calls.push(format!("filter {}", filter.to_json()));
            self
        }

        fn sort(mut self, keys: &[SortKey]) -> Self {
            let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
            self.calls.push(format!("sort {}", keys.join(" ")));
            self
        }

        fn select(mut self, projection: &Projection) -> Self {
            self.calls.push(format!("select {projection:?}"));
            self
        }

        fn text_search(mut self, text: &TextPredicate) -> Self {
            self.calls.push(format!("text {}", text.quoted()));
            self
        }

        fn skip_limit(mut self, skip: u64, limit: u64) -> Self {
            self.calls.push(format!("window {skip} {limit}"));
            self
        }

        async fn execute(self) -> Result<Vec<Document>, Self::Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_apply_calls_stages_in_order() {
        let request = QueryRequest::parse("q=rust-dev&page=2&limit=3&sort=-salary,title&jobType=Permanent");
        let handle = QueryPlan::from_request(&request).apply(RecordingHandle::default());
        assert_eq!(
            handle.calls,
            vec![
                r#"filter {"jobType":"Permanent"}"#.to_string(),
                "sort -salary title".to_string(),
                r#"select Exclude(["__v"])"#.to_string(),
                r#"text "rust dev""#.to_string(),
                "window 3 3".to_string(),
            ]
        );
    }

    #[test]
    fn test_apply_skips_absent_stages() {
        let handle = QueryPlan::new().apply(RecordingHandle::default());
        assert_eq!(handle.calls, vec!["filter {}".to_string(), "select All".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_runs_after_apply() {
        let handle = QueryPlan::new().apply(RecordingHandle::default());
        let documents = handle.execute().await.expect("execute");
        assert!(documents.is_empty());
    }
}
