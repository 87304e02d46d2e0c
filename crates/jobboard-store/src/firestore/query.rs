//! Query plans executed against Firestore.
//!
//! Filters Firestore can evaluate are pushed into a structured query. The
//! rest stays behind as a residual evaluated in-process over what the server
//! returns. Sorting and the page window are pushed only when the server-side
//! result is already final; otherwise they run in-process too.

use async_trait::async_trait;
use tracing::debug;

use jobboard_query::{
    eval, Comparator, Document as JsonDocument, FilterExpression, Operand, Predicate, Projection,
    QueryHandle, QueryPlan, SortDirection, SortKey, TextPredicate, Window,
};

use super::client::FirestoreClient;
use super::convert::{document_to_json, operand_value};
use super::types::{CollectionSelector, FieldReference, Filter, Order, StructuredQuery, Value};
use crate::error::{StoreError, StoreResult};
use crate::metrics::record_residual;
use crate::schema::{CollectionSchema, FieldKind};

/// Most values Firestore accepts in one `IN` or `ARRAY_CONTAINS_ANY`.
const MAX_DISJUNCTION_VALUES: usize = 30;

fn order_direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASCENDING",
        SortDirection::Descending => "DESCENDING",
    }
}

fn relational_op(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Gt => "GREATER_THAN",
        Comparator::Gte => "GREATER_THAN_OR_EQUAL",
        Comparator::Lt => "LESS_THAN",
        Comparator::Lte => "LESS_THAN_OR_EQUAL",
        Comparator::In => "IN",
    }
}

/// A filter expression split into its server-side and in-process parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSplit {
    pub pushed: Vec<Filter>,
    pub residual: FilterExpression,
    /// Field carrying a pushed range filter.
    pub range_field: Option<String>,
}

#[derive(Default)]
struct SplitState {
    split: FilterSplit,
    disjunction_used: bool,
    array_filter_used: bool,
}

/// Split `filter` by what Firestore can evaluate for `schema`.
pub fn split_filter(schema: &CollectionSchema, filter: &FilterExpression) -> FilterSplit {
    let mut state = SplitState::default();
    for (path, predicate) in filter.iter() {
        let pushed = match schema.kind_of(path) {
            Some(kind) if kind.is_scalar() => push_scalar(&mut state, path, kind, predicate),
            Some(FieldKind::StringArray) => push_array(&mut state, path, predicate),
            _ => None,
        };
        match pushed {
            Some(filters) => state.split.pushed.extend(filters),
            None => {
                state.split.residual = std::mem::take(&mut state.split.residual)
                    .with_predicate(path.clone(), predicate.clone());
            }
        }
    }
    state.split
}

fn coerce_all(values: &[String], kind: FieldKind) -> Option<Vec<Value>> {
    values.iter().map(|value| operand_value(value, kind)).collect()
}

fn list_value(values: Vec<Value>) -> Value {
    Value::ArrayValue(super::types::ArrayValue {
        values: Some(values),
    })
}

fn push_membership(state: &mut SplitState, path: &str, op: &str, values: Vec<Value>) -> Option<Filter> {
    if values.is_empty() || values.len() > MAX_DISJUNCTION_VALUES || state.disjunction_used {
        return None;
    }
    state.disjunction_used = true;
    Some(Filter::field(path, op, list_value(values)))
}

fn push_scalar(
    state: &mut SplitState,
    path: &str,
    kind: FieldKind,
    predicate: &Predicate,
) -> Option<Vec<Filter>> {
    match predicate {
        Predicate::Equals(Operand::Value(value)) => {
            let value = operand_value(value, kind)?;
            Some(vec![Filter::field(path, "EQUAL", value)])
        }
        Predicate::Equals(Operand::List(values)) => {
            let values = coerce_all(values, kind)?;
            push_membership(state, path, "IN", values).map(|filter| vec![filter])
        }
        Predicate::Compare(comparators) => {
            let has_range = comparators.keys().any(|c| *c != Comparator::In);
            if has_range && state.split.range_field.as_deref().is_some_and(|f| f != path) {
                return None;
            }
            let has_in = comparators.contains_key(&Comparator::In);
            if has_in && state.disjunction_used {
                return None;
            }

            let mut filters = Vec::with_capacity(comparators.len());
            let mut membership = None;
            for (comparator, operand) in comparators {
                match comparator {
                    Comparator::In => {
                        let values = coerce_all(operand.values(), kind)?;
                        if values.is_empty() || values.len() > MAX_DISJUNCTION_VALUES {
                            return None;
                        }
                        membership = Some(values);
                    }
                    relational => {
                        let bound = operand_value(operand.values().last()?, kind)?;
                        filters.push(Filter::field(path, relational_op(*relational), bound));
                    }
                }
            }
            if let Some(values) = membership {
                filters.push(push_membership(state, path, "IN", values)?);
            }
            if has_range {
                state.split.range_field = Some(path.to_string());
            }
            Some(filters)
        }
    }
}

fn push_array(state: &mut SplitState, path: &str, predicate: &Predicate) -> Option<Vec<Filter>> {
    if state.array_filter_used {
        return None;
    }
    let filter = match predicate {
        Predicate::Equals(Operand::Value(value)) => {
            Filter::field(path, "ARRAY_CONTAINS", Value::StringValue(value.clone()))
        }
        Predicate::Equals(Operand::List(values)) => {
            push_membership(state, path, "ARRAY_CONTAINS_ANY", string_values(values))?
        }
        Predicate::Compare(comparators) => match comparators.iter().next() {
            Some((Comparator::In, operand)) if comparators.len() == 1 => push_membership(
                state,
                path,
                "ARRAY_CONTAINS_ANY",
                string_values(operand.values()),
            )?,
            _ => return None,
        },
    };
    state.array_filter_used = true;
    Some(vec![filter])
}

fn string_values(values: &[String]) -> Vec<Value> {
    values.iter().cloned().map(Value::StringValue).collect()
}

/// Query handle that builds a Firestore structured query.
#[derive(Clone)]
pub struct FirestoreQuery {
    client: FirestoreClient,
    schema: CollectionSchema,
    plan: QueryPlan,
}

impl FirestoreQuery {
    pub fn new(client: FirestoreClient, schema: CollectionSchema) -> Self {
        Self {
            client,
            schema,
            plan: QueryPlan::new(),
        }
    }

    /// Whether sorting and paging must wait until after in-process filtering.
    fn needs_in_process(&self, split: &FilterSplit) -> bool {
        if !split.residual.is_empty() || self.plan.text.is_some() {
            return true;
        }
        let sortable = self
            .plan
            .sort
            .iter()
            .all(|key| self.schema.kind_of(&key.field).is_some_and(|kind| kind.is_scalar()));
        if !sortable {
            return true;
        }
        match (&split.range_field, self.plan.sort.first()) {
            (Some(range), Some(first)) => *range != first.field,
            _ => false,
        }
    }

    /// Structured query for this plan, and whether the rest runs in-process.
    pub fn structured_query(&self) -> (StructuredQuery, FilterSplit, bool) {
        let split = split_filter(&self.schema, &self.plan.filter);
        let in_process = self.needs_in_process(&split);

        let mut query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.schema.name.to_string(),
                all_descendants: None,
            }],
            r#where: Filter::and(split.pushed.clone()),
            ..StructuredQuery::default()
        };

        if !in_process {
            if !self.plan.sort.is_empty() {
                query.order_by = Some(
                    self.plan
                        .sort
                        .iter()
                        .map(|key| Order {
                            field: FieldReference {
                                field_path: key.field.clone(),
                            },
                            direction: order_direction(key.direction).to_string(),
                        })
                        .collect(),
                );
            }
            if let Some(window) = self.plan.window {
                query.offset = Some(i32::try_from(window.skip).unwrap_or(i32::MAX));
                query.limit = Some(i32::try_from(window.limit).unwrap_or(i32::MAX));
            }
        }
        (query, split, in_process)
    }

    async fn fetch(&self, query: StructuredQuery) -> StoreResult<Vec<JsonDocument>> {
        let collection = self.schema.name;
        let documents = self
            .client
            .with_retry("run_query", || self.client.run_query(collection, query.clone()))
            .await?;
        Ok(documents.into_iter().map(document_to_json).collect())
    }
}

#[async_trait]
impl QueryHandle for FirestoreQuery {
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

    async fn execute(self) -> Result<Vec<JsonDocument>, Self::Error> {
        let (query, split, in_process) = self.structured_query();
        let documents = self.fetch(query).await?;

        let remaining = if in_process {
            record_residual(self.schema.name, documents.len());
            debug!(
                collection = self.schema.name,
                fetched = documents.len(),
                residual = split.residual.len(),
                "Evaluating query in-process"
            );
            let mut plan = QueryPlan::new()
                .with_filter(split.residual)
                .with_sort(self.plan.sort.clone())
                .with_projection(self.plan.projection.clone());
            plan.text = self.plan.text.clone();
            plan.window = self.plan.window;
            plan
        } else {
            QueryPlan::new().with_projection(self.plan.projection.clone())
        };

        Ok(eval::execute_plan(&remaining, documents, self.schema.text_fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::client::FirestoreConfig;
    use crate::firestore::retry::RetryConfig;
    use crate::firestore::token_cache::TokenSource;
    use crate::schema::JOBS;
    use jobboard_query::QueryRequest;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plan_for(query: &str) -> QueryPlan {
        QueryPlan::from_request_with(&QueryRequest::parse(query), &JOBS.plan_defaults())
    }

    fn client(base_url: String) -> FirestoreClient {
        let config = FirestoreConfig {
            project_id: "p".into(),
            database_id: "(default)".into(),
            emulator_host: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            retry: RetryConfig::default(),
        };
        FirestoreClient::with_token_source(config, base_url, TokenSource::Static("t".into())).unwrap()
    }

    fn query_for(plan: &QueryPlan) -> FirestoreQuery {
        plan.apply(FirestoreQuery::new(client("http://unused".into()), JOBS))
    }

    #[test]
    fn test_split_pushes_typed_filters() {
        let plan = plan_for("salary[gte]=50000&jobType=Permanent&industry=IT");
        let split = split_filter(&JOBS, &plan.filter);
        assert!(split.residual.is_empty());
        assert_eq!(split.pushed.len(), 3);
        assert!(split.pushed.contains(&Filter::field(
            "salary",
            "GREATER_THAN_OR_EQUAL",
            Value::IntegerValue("50000".into())
        )));
        assert!(split.pushed.contains(&Filter::field(
            "industry",
            "ARRAY_CONTAINS",
            Value::StringValue("IT".into())
        )));
        assert_eq!(split.range_field.as_deref(), Some("salary"));
    }

    #[test]
    fn test_split_leaves_nested_and_uncoercible_as_residual() {
        let plan = plan_for("location[city]=Boston&salary[gt]=lots&title=Dev");
        let split = split_filter(&JOBS, &plan.filter);
        assert_eq!(split.pushed.len(), 1);
        assert!(split.residual.get("location.city").is_some());
        assert!(split.residual.get("salary").is_some());
    }

    #[test]
    fn test_split_allows_one_disjunction() {
        let plan = plan_for("jobType[in]=Permanent,Internship&experience[in]=a,b");
        let split = split_filter(&JOBS, &plan.filter);
        assert_eq!(split.pushed.len(), 1);
        assert_eq!(split.residual.len(), 1);
    }

    #[test]
    fn test_range_on_sort_field_is_fully_pushed() {
        let query = query_for(&plan_for("salary[gte]=50000&sort=-salary&limit=2&page=2"));
        let (structured, _, in_process) = query.structured_query();
        assert!(!in_process);
        assert_eq!(structured.offset, Some(2));
        assert_eq!(structured.limit, Some(2));
        assert_eq!(structured.order_by.unwrap()[0].direction, "DESCENDING");
    }

    #[test]
    fn test_range_off_sort_field_runs_in_process() {
        let query = query_for(&plan_for("salary[gte]=50000"));
        let (structured, _, in_process) = query.structured_query();
        assert!(in_process);
        assert!(structured.order_by.is_none());
        assert!(structured.limit.is_none());
        assert!(structured.r#where.is_some());
    }

    #[test]
    fn test_text_search_runs_in_process() {
        let query = query_for(&plan_for("q=rust"));
        assert!(query.structured_query().2);
    }

    #[tokio::test]
    async fn test_execute_applies_residual_and_projection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents:runQuery"))
            .and(body_partial_json(json!({
                "structuredQuery": {"from": [{"collectionId": "jobs"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"document": {"fields": {
                    "_id": {"stringValue": "a"},
                    "title": {"stringValue": "Rust dev"},
                    "location": {"mapValue": {"fields": {"city": {"stringValue": "Boston"}}}},
                    "postingDate": {"timestampValue": "2024-01-02T00:00:00Z"}
                }}},
                {"document": {"fields": {
                    "_id": {"stringValue": "b"},
                    "title": {"stringValue": "Go dev"},
                    "location": {"mapValue": {"fields": {"city": {"stringValue": "Austin"}}}},
                    "postingDate": {"timestampValue": "2024-01-03T00:00:00Z"}
                }}}
            ])))
            .mount(&server)
            .await;

        let plan = plan_for("location[city]=Boston&fields=title");
        let query = plan.apply(FirestoreQuery::new(
            client(format!("{}/documents", server.uri())),
            JOBS,
        ));
        let docs = query.execute().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(serde_json::Value::Object(docs[0].clone()), json!({"_id": "a", "title": "Rust dev"}));
    }
}
