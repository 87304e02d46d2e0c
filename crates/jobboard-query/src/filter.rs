//! Structural filter built from the non-reserved query parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::request::{QueryRequest, QueryValue};
use crate::RESERVED_KEYS;

/// Relational or set-membership operator recognised in nested keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Comparator {
    pub const ALL: [Comparator; 5] = [Self::Gt, Self::Gte, Self::Lt, Self::Lte, Self::In];

    /// Exact, case-sensitive token match.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub const fn token(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
        }
    }

    /// Document-database spelling of the operator.
    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// Right-hand side of a predicate, still in textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Value(String),
    List(Vec<String>),
}

impl Operand {
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    /// Every candidate value, one for scalars.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Value(value) => std::slice::from_ref(value),
            Self::List(values) => values,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => json!(value),
            Self::List(values) => json!(values),
        }
    }
}

/// Condition attached to a single field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Field equals the operand (any member, for lists).
    Equals(Operand),
    /// Every comparator must hold.
    Compare(BTreeMap<Comparator, Operand>),
}

/// Field path to predicate mapping; all entries are conjoined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    fields: BTreeMap<String, Predicate>,
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_equals(field.into(), Operand::value(value));
        self
    }

    /// Add a comparator predicate.
    pub fn compare(mut self, field: impl Into<String>, comparator: Comparator, operand: Operand) -> Self {
        self.set_comparator(field.into(), comparator, operand);
        self
    }

    /// Set the whole predicate of a field, replacing any previous one.
    pub fn with_predicate(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.fields.insert(field.into(), predicate);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Predicate)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render in document-database syntax, e.g. `{"salary": {"$gte": "50000"}}`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (field, predicate) in &self.fields {
            let rendered = match predicate {
                Predicate::Equals(operand) => operand.to_json(),
                Predicate::Compare(comparators) => Value::Object(
                    comparators
                        .iter()
                        .map(|(cmp, operand)| (cmp.operator().to_string(), operand.to_json()))
                        .collect(),
                ),
            };
            out.insert(field.clone(), rendered);
        }
        Value::Object(out)
    }

    fn set_equals(&mut self, field: String, operand: Operand) {
        self.fields.insert(field, Predicate::Equals(operand));
    }

    fn set_comparator(&mut self, field: String, comparator: Comparator, operand: Operand) {
        match self.fields.get_mut(&field) {
            Some(Predicate::Compare(comparators)) => {
                comparators.insert(comparator, operand);
            }
            _ => {
                self.fields.insert(
                    field,
                    Predicate::Compare(BTreeMap::from([(comparator, operand)])),
                );
            }
        }
    }
}

impl FromIterator<(String, Predicate)> for FilterExpression {
    fn from_iter<I: IntoIterator<Item = (String, Predicate)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Build the structural filter of a request.
///
/// Reserved control keys are skipped. Nested keys that are exactly one of the
/// comparator tokens become operators on the enclosing field; any other nested
/// key extends the field path with a dot.
pub fn build_filter(request: &QueryRequest) -> FilterExpression {
    let mut filter = FilterExpression::new();
    for (key, value) in request.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        walk(key, value, &mut filter);
    }
    filter
}

fn walk(path: &str, value: &QueryValue, filter: &mut FilterExpression) {
    match value {
        QueryValue::Text(text) => filter.set_equals(path.to_string(), Operand::Value(text.clone())),
        QueryValue::List(items) => filter.set_equals(path.to_string(), Operand::List(items.clone())),
        QueryValue::Map(entries) => {
            for (key, nested) in entries {
                match Comparator::from_token(key) {
                    Some(comparator) => {
                        if let Some(operand) = comparator_operand(comparator, nested) {
                            filter.set_comparator(path.to_string(), comparator, operand);
                        }
                    }
                    None => walk(&format!("{path}.{key}"), nested, filter),
                }
            }
        }
    }
}

fn comparator_operand(comparator: Comparator, value: &QueryValue) -> Option<Operand> {
    match (comparator, value) {
        (Comparator::In, QueryValue::Text(text)) => Some(Operand::List(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        (Comparator::In, QueryValue::List(items)) => Some(Operand::List(items.clone())),
        (_, QueryValue::Text(text)) => Some(Operand::Value(text.clone())),
        // A repeated range bound keeps the last occurrence.
        (_, QueryValue::List(items)) => items.last().cloned().map(Operand::Value),
        (_, QueryValue::Map(_)) => None,
    }
}
