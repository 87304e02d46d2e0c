//! In-process evaluation of query plans over JSON documents.
//!
//! Used by the in-memory store and for the residual part of plans a
//! backend cannot express natively.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};

use crate::filter::{Comparator, FilterExpression, Operand, Predicate};
use crate::plan::{Projection, QueryPlan, SortDirection, SortKey, TextPredicate, Window, ID_FIELD};
use crate::Document;

/// Run a whole plan: filter and text, then sort, window, projection.
pub fn execute_plan<I>(plan: &QueryPlan, documents: I, text_fields: &[&str]) -> Vec<Document>
where
    I: IntoIterator<Item = Document>,
{
    let mut matched: Vec<Document> = documents
        .into_iter()
        .filter(|doc| matches_filter(doc, &plan.filter))
        .filter(|doc| {
            plan.text
                .as_ref()
                .map_or(true, |text| matches_text(doc, text, text_fields))
        })
        .collect();
    sort_documents(&mut matched, &plan.sort);
    apply_window(matched, plan.window)
        .into_iter()
        .map(|doc| project(doc, &plan.projection))
        .collect()
}

/// All values reachable at a dotted path. Arrays are flattened at every level.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*first) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, rest: &[&str], out: &mut Vec<&'a Value>) {
    match (value, rest.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                collect(item, rest, out);
            }
        }
        (_, None) => out.push(value),
        (Value::Object(map), Some((key, remaining))) => {
            if let Some(next) = map.get(*key) {
                collect(next, remaining, out);
            }
        }
        _ => {}
    }
}

pub fn matches_filter(doc: &Document, filter: &FilterExpression) -> bool {
    filter
        .iter()
        .all(|(path, predicate)| matches_predicate(&lookup(doc, path), predicate))
}

fn matches_predicate(values: &[&Value], predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Equals(operand) => any_equal(values, operand),
        Predicate::Compare(comparators) => comparators.iter().all(|(comparator, operand)| match comparator {
            Comparator::In => any_equal(values, operand),
            relational => operand.values().last().is_some_and(|bound| {
                values
                    .iter()
                    .any(|value| satisfies(*relational, compare_operand(value, bound)))
            }),
        }),
    }
}

fn any_equal(values: &[&Value], operand: &Operand) -> bool {
    values.iter().any(|value| {
        operand
            .values()
            .iter()
            .any(|candidate| compare_operand(value, candidate) == Some(Ordering::Equal))
    })
}

fn satisfies(comparator: Comparator, ordering: Option<Ordering>) -> bool {
    match (comparator, ordering) {
        (Comparator::Gt, Some(Ordering::Greater)) => true,
        (Comparator::Gte, Some(Ordering::Greater | Ordering::Equal)) => true,
        (Comparator::Lt, Some(Ordering::Less)) => true,
        (Comparator::Lte, Some(Ordering::Less | Ordering::Equal)) => true,
        _ => false,
    }
}

/// Compare a document value with a textual operand coerced to its type.
pub fn compare_operand(value: &Value, operand: &str) -> Option<Ordering> {
    match value {
        Value::Number(number) => {
            let left = number.as_f64()?;
            let right: f64 = operand.trim().parse().ok()?;
            left.partial_cmp(&right)
        }
        Value::Bool(flag) => {
            let right: bool = operand.trim().parse().ok()?;
            Some(flag.cmp(&right))
        }
        Value::String(text) => match (parse_timestamp(text), parse_timestamp(operand)) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => Some(text.as_str().cmp(operand)),
        },
        Value::Null => (operand == "null").then_some(Ordering::Equal),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// RFC 3339 timestamp or bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp);
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

/// Case-insensitive phrase containment in any of the text-indexed fields.
pub fn matches_text(doc: &Document, text: &TextPredicate, fields: &[&str]) -> bool {
    let needle = text.phrase.to_lowercase();
    fields.iter().any(|field| {
        lookup(doc, field).into_iter().any(|value| {
            value
                .as_str()
                .is_some_and(|haystack| haystack.to_lowercase().contains(&needle))
        })
    })
}

/// Stable multi-key sort; documents missing a key sort first when ascending.
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_values(sort_value(a, &key.field), sort_value(b, &key.field));
                match key.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn sort_value<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    lookup(doc, path).into_iter().next()
}

/// Total order over optional JSON values used for sorting.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => {
            let by_rank = type_rank(left).cmp(&type_rank(right));
            if by_rank.is_ne() {
                return by_rank;
            }
            match (left, right) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .unwrap_or(Ordering::Equal),
                (Value::String(a), Value::String(b)) => match (parse_timestamp(a), parse_timestamp(b)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => a.cmp(b),
                },
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                _ => Ordering::Equal,
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

pub fn apply_window<T>(items: Vec<T>, window: Option<Window>) -> Vec<T> {
    let Some(window) = window else {
        return items;
    };
    let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
    let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(limit).collect()
}

/// Reduce a document to the projected paths.
pub fn project(doc: Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => doc,
        Projection::Include(fields) => {
            let mut out = Map::new();
            if let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
            for field in fields {
                let segments: Vec<&str> = field.split('.').collect();
                copy_path(&doc, &mut out, &segments);
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc;
            for field in fields {
                let segments: Vec<&str> = field.split('.').collect();
                remove_path(&mut out, &segments);
            }
            out
        }
    }
}

fn copy_path(source: &Document, target: &mut Document, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(*first) else {
        return;
    };
    if rest.is_empty() {
        target.insert((*first).to_string(), value.clone());
        return;
    }
    if let Value::Object(inner) = value {
        let entry = target
            .entry((*first).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(nested) = entry {
            copy_path(inner, nested, rest);
        }
    }
}

fn remove_path(target: &mut Document, segments: &[&str]) {
    match segments {
        [] => {}
        [last] => {
            target.remove(*last);
        }
        [first, rest @ ..] => {
            if let Some(Value::Object(nested)) = target.get_mut(*first) {
                remove_path(nested, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::QueryRequest;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn jobs() -> Vec<Document> {
        vec![
            doc(json!({
                "_id": "a", "__v": 0, "title": "Senior Engineer", "salary": 90000,
                "jobType": "Permanent", "industry": ["IT", "Banking"],
                "postingDate": "2024-03-01T00:00:00Z",
                "location": {"city": "Boston"},
                "applicantsApplied": [{"id": "u1", "resume": "r.pdf"}]
            })),
            doc(json!({
                "_id": "b", "__v": 0, "title": "Intern", "salary": 20000,
                "jobType": "Internship", "industry": ["Education"],
                "postingDate": "2024-05-01T00:00:00Z",
                "location": {"city": "Denver"},
                "applicantsApplied": []
            })),
            doc(json!({
                "_id": "c", "__v": 0, "title": "Bank Teller", "salary": 50000,
                "jobType": "Temporary", "industry": ["Banking"],
                "postingDate": "2024-04-01T00:00:00Z",
                "location": {"city": "Boston"}
            })),
        ]
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .filter_map(|doc| doc.get("_id").and_then(Value::as_str))
            .collect()
    }

    fn run(query: &str) -> Vec<Document> {
        let plan = QueryPlan::from_request(&QueryRequest::parse(query));
        execute_plan(&plan, jobs(), &["title", "description"])
    }

    #[test]
    fn test_numeric_comparators() {
        assert_eq!(ids(&run("salary[gte]=50000")), vec!["c", "a"]);
        assert_eq!(ids(&run("salary[gt]=20000&salary[lt]=90000")), vec!["c"]);
        assert_eq!(ids(&run("salary[lte]=20000")), vec!["b"]);
    }

    #[test]
    fn test_equality_and_in_over_arrays() {
        assert_eq!(ids(&run("industry=Banking")), vec!["c", "a"]);
        assert_eq!(ids(&run("jobType[in]=Permanent,Internship")), vec!["b", "a"]);
        assert_eq!(ids(&run("location.city=Boston&jobType=Temporary")), vec!["c"]);
        assert_eq!(ids(&run("applicantsApplied[id]=u1")), vec!["a"]);
    }

    #[test]
    fn test_timestamp_comparison() {
        assert_eq!(ids(&run("postingDate[gte]=2024-04-01")), vec!["b", "c"]);
    }

    #[test]
    fn test_text_search_is_case_insensitive_phrase() {
        assert_eq!(ids(&run("q=senior-engineer")), vec!["a"]);
        assert_eq!(ids(&run("q=BANK")), vec!["c"]);
        assert!(run("q=engineer-senior").is_empty());
    }

    #[test]
    fn test_text_search_narrows_the_range_filter() {
        let mut documents = jobs();
        documents.push(doc(json!({
            "_id": "d", "__v": 0, "title": "Senior Engineer (volunteer)", "salary": 500,
            "postingDate": "2024-06-01T00:00:00Z"
        })));
        let plan = QueryPlan::from_request(&QueryRequest::parse("salary[gte]=1000&q=senior-engineer"));
        let results = execute_plan(&plan, documents, &["title", "description"]);
        assert_eq!(ids(&results), vec!["a"]);
    }

    #[test]
    fn test_sort_projection_and_window() {
        let results = run("sort=-salary&fields=title,salary&page=1&limit=2&salary[gte]=20000");
        assert_eq!(
            results,
            vec![
                doc(json!({"_id": "a", "title": "Senior Engineer", "salary": 90000})),
                doc(json!({"_id": "c", "title": "Bank Teller", "salary": 50000})),
            ]
        );
        assert_eq!(ids(&run("sort=salary&page=2&limit=2")), vec!["a"]);
        assert!(run("page=5").is_empty());
    }

    #[test]
    fn test_default_projection_hides_version() {
        let results = run("");
        assert!(results.iter().all(|doc| !doc.contains_key("__v")));
        assert!(results.iter().all(|doc| doc.contains_key("title")));
    }

    #[test]
    fn test_exclusion_projection_with_nested_path() {
        let results = run("fields=-location.city,-salary");
        let first = &results[0];
        assert!(!first.contains_key("salary"));
        assert_eq!(first.get("location"), Some(&json!({})));
        assert_eq!(first.get("__v"), Some(&json!(0)));
    }

    #[test]
    fn test_missing_values_sort_first_and_ties_are_stable() {
        let mut documents = vec![
            doc(json!({"_id": "1", "rank": 2})),
            doc(json!({"_id": "2"})),
            doc(json!({"_id": "3", "rank": 2})),
            doc(json!({"_id": "4", "rank": 1})),
        ];
        sort_documents(&mut documents, &[SortKey::asc("rank")]);
        assert_eq!(ids(&documents), vec!["2", "4", "1", "3"]);
    }

    #[test]
    fn test_compare_operand_coercion() {
        assert_eq!(compare_operand(&json!(10), "9.5"), Some(Ordering::Greater));
        assert_eq!(compare_operand(&json!(true), "true"), Some(Ordering::Equal));
        assert_eq!(compare_operand(&json!("abc"), "abd"), Some(Ordering::Less));
        assert_eq!(compare_operand(&json!(10), "ten"), None);
        assert_eq!(compare_operand(&json!({"a": 1}), "a"), None);
    }
}
