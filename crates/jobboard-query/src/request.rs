//! Parsed query-string parameters.
//!
//! Keys use bracket notation for nesting, so `salary[gte]=50000` becomes
//! `{salary: {gte: "50000"}}`, and repeating a key turns its value into a list.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

/// Maximum bracket nesting kept as structure; deeper segments stay literal.
const MAX_DEPTH: usize = 5;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Scalar view of the value. Lists are joined with commas; maps have none.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(text) => Some(Cow::Borrowed(text.as_str())),
            Self::List(items) => Some(Cow::Owned(items.join(","))),
            Self::Map(_) => None,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Text(existing) => {
                let first = std::mem::take(existing);
                *self = Self::List(vec![first, value]);
            }
            Self::List(items) => items.push(value),
            Self::Map(_) => trace!("dropping scalar for key already holding nested params"),
        }
    }
}

/// Query parameters of one request, keyed by top-level name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryRequest {
    params: BTreeMap<String, QueryValue>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still percent-encoded) query string.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut request = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            request.insert_raw(&key, value.into_owned());
        }
        request
    }

    /// Builder-style insertion of an already structured value.
    pub fn with(mut self, key: impl Into<String>, value: QueryValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    /// Non-empty scalar value of a key.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key)
            .and_then(QueryValue::as_text)
            .filter(|text| !text.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn insert_raw(&mut self, key: &str, value: String) {
        let segments = split_key(key);
        let Some((root, rest)) = segments.split_first() else {
            return;
        };
        if root.is_empty() {
            return;
        }
        insert_path(&mut self.params, root, rest, value);
    }
}

impl<K: Into<String>> FromIterator<(K, QueryValue)> for QueryRequest {
    fn from_iter<I: IntoIterator<Item = (K, QueryValue)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Split `a[b][c]` into `["a", "b", "c"]`. Unbalanced brackets keep the key whole.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![key.to_string()];
        };
        if segments.len() > MAX_DEPTH {
            if let Some(last) = segments.last_mut() {
                last.push_str(rest);
            }
            return segments;
        }
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }

    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    segments
}

fn insert_path(map: &mut BTreeMap<String, QueryValue>, key: &str, rest: &[String], value: String) {
    match rest.split_first() {
        None => match map.get_mut(key) {
            Some(existing) => existing.push(value),
            None => {
                map.insert(key.to_string(), QueryValue::Text(value));
            }
        },
        Some((next, _)) if next.is_empty() => match map.get_mut(key) {
            Some(existing) => existing.push(value),
            None => {
                map.insert(key.to_string(), QueryValue::List(vec![value]));
            }
        },
        Some((next, remaining)) => {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| QueryValue::Map(BTreeMap::new()));
            match entry {
                QueryValue::Map(nested) => insert_path(nested, next, remaining, value),
                _ => trace!(key, "dropping nested param for key already holding a scalar"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_params() {
        let request = QueryRequest::parse("jobType=Permanent&page=2");
        assert_eq!(request.get("jobType"), Some(&QueryValue::text("Permanent")));
        assert_eq!(request.text("page").as_deref(), Some("2"));
        assert_eq!(request.len(), 2);
    }

    #[test]
    fn test_parse_bracket_params() {
        let request = QueryRequest::parse("salary%5Bgte%5D=50000&salary[lte]=90000");
        let expected: BTreeMap<String, QueryValue> = [
            ("gte".to_string(), QueryValue::text("50000")),
            ("lte".to_string(), QueryValue::text("90000")),
        ]
        .into_iter()
        .collect();
        assert_eq!(request.get("salary"), Some(&QueryValue::Map(expected)));
    }

    #[test]
    fn test_repeated_keys_become_lists() {
        let request = QueryRequest::parse("industry=IT&industry=Banking&tags[]=rust");
        assert_eq!(
            request.get("industry"),
            Some(&QueryValue::List(vec!["IT".into(), "Banking".into()]))
        );
        assert_eq!(request.get("tags"), Some(&QueryValue::List(vec!["rust".into()])));
        assert_eq!(request.text("industry").as_deref(), Some("IT,Banking"));
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let request = QueryRequest::parse("experience=No+experience");
        assert_eq!(request.text("experience").as_deref(), Some("No experience"));
    }

    #[test]
    fn test_unbalanced_brackets_stay_literal() {
        let request = QueryRequest::parse("salary[gte=5&[x]=1");
        assert_eq!(request.get("salary[gte"), Some(&QueryValue::text("5")));
        assert_eq!(request.get("[x]"), Some(&QueryValue::text("1")));
    }

    #[test]
    fn test_empty_values_are_not_text() {
        let request = QueryRequest::parse("sort=&q");
        assert!(request.get("sort").is_some());
        assert!(request.text("sort").is_none());
        assert!(request.text("q").is_none());
    }

    #[test]
    fn test_scalar_then_nested_keeps_scalar() {
        let request = QueryRequest::parse("salary=10&salary[gte]=5");
        assert_eq!(request.get("salary"), Some(&QueryValue::text("10")));
    }
}
