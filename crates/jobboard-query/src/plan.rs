//! Query plan assembled stage by stage from a request.

use std::fmt;

use crate::filter::{build_filter, FilterExpression};
use crate::handle::QueryHandle;
use crate::request::QueryRequest;

/// Internal document version field, hidden unless explicitly requested.
pub const VERSION_FIELD: &str = "__v";

/// Identifier field, always part of an inclusion projection.
pub const ID_FIELD: &str = "_id";

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse `field` or `-field`. Blank segments yield `None`.
    pub fn parse(segment: &str) -> Option<Self> {
        let segment = segment.trim();
        match segment.strip_prefix('-') {
            Some(field) if !field.is_empty() => Some(Self::desc(field)),
            Some(_) => None,
            None if segment.is_empty() => None,
            None => Some(Self::asc(segment)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.field),
            SortDirection::Descending => write!(f, "-{}", self.field),
        }
    }
}

/// Which fields of each document are returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Whole documents.
    #[default]
    All,
    /// Only these paths, plus `_id`.
    Include(Vec<String>),
    /// Everything but these paths.
    Exclude(Vec<String>),
}

impl Projection {
    /// Projection used when the request names no fields.
    pub fn hide_version() -> Self {
        Self::Exclude(vec![VERSION_FIELD.to_string()])
    }

    /// Also drop `hidden` paths, even ones a request names explicitly.
    pub fn hiding(self, hidden: &[&str]) -> Self {
        let is_hidden = |path: &str| {
            hidden.iter().any(|field| {
                path == *field
                    || path
                        .strip_prefix(*field)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
        };
        let hidden = hidden.iter().map(|field| field.to_string());
        match self {
            Self::All => Self::Exclude(hidden.collect()),
            Self::Exclude(mut fields) => {
                for field in hidden {
                    if !fields.contains(&field) {
                        fields.push(field);
                    }
                }
                Self::Exclude(fields)
            }
            Self::Include(fields) => {
                Self::Include(fields.into_iter().filter(|path| !is_hidden(path)).collect())
            }
        }
    }

    fn parse(fields: &str) -> Option<Self> {
        let names: Vec<&str> = fields
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return None;
        }

        if names.iter().all(|name| name.starts_with('-')) {
            let excluded: Vec<String> = names
                .iter()
                .map(|name| name.trim_start_matches('-'))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            return (!excluded.is_empty()).then_some(Self::Exclude(excluded));
        }

        // Mixed lists keep only the positive entries.
        Some(Self::Include(
            names
                .into_iter()
                .filter(|name| !name.starts_with('-'))
                .map(str::to_string)
                .collect(),
        ))
    }
}

/// Quoted-phrase full-text predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPredicate {
    pub phrase: String,
}

impl TextPredicate {
    pub fn phrase(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }

    /// Search string in the document-database phrase form.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.phrase)
    }
}

/// Skip/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

impl Window {
    pub fn page(page: u64, limit: u64) -> Self {
        Self {
            skip: page.saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }
}

/// Per-collection fallbacks used when the request leaves a stage unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDefaults {
    /// Timestamp field sorted descending when no `sort` is given.
    pub sort_field: String,
    pub page: u64,
    pub limit: u64,
}

impl PlanDefaults {
    pub fn sorted_by(field: impl Into<String>) -> Self {
        Self {
            sort_field: field.into(),
            ..Self::default()
        }
    }
}

impl Default for PlanDefaults {
    fn default() -> Self {
        Self {
            sort_field: "postingDate".to_string(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Ordered query directives.
///
/// Each stage consumes the plan and returns the next one. Handles receive the
/// directives in the order filter, sort, projection, text search, pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub filter: FilterExpression,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub text: Option<TextPredicate>,
    pub window: Option<Window>,
}

impl QueryPlan {
    /// Empty plan: matches everything, natural order, whole documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every stage with the job defaults.
    pub fn from_request(request: &QueryRequest) -> Self {
        Self::from_request_with(request, &PlanDefaults::default())
    }

    /// Run every stage with collection-specific defaults.
    pub fn from_request_with(request: &QueryRequest, defaults: &PlanDefaults) -> Self {
        Self::new()
            .apply_filter(request)
            .apply_sort(request, defaults)
            .apply_field_projection(request)
            .apply_text_search(request)
            .apply_pagination(request, defaults)
    }

    pub fn apply_filter(self, request: &QueryRequest) -> Self {
        Self {
            filter: build_filter(request),
            ..self
        }
    }

    pub fn apply_sort(self, request: &QueryRequest, defaults: &PlanDefaults) -> Self {
        let keys: Vec<SortKey> = request
            .text("sort")
            .map(|sort| sort.split(',').filter_map(SortKey::parse).collect())
            .unwrap_or_default();
        let sort = if keys.is_empty() {
            vec![SortKey::desc(defaults.sort_field.clone())]
        } else {
            keys
        };
        Self { sort, ..self }
    }

    pub fn apply_field_projection(self, request: &QueryRequest) -> Self {
        let projection = request
            .text("fields")
            .and_then(|fields| Projection::parse(&fields))
            .unwrap_or_else(Projection::hide_version);
        Self { projection, ..self }
    }

    pub fn apply_text_search(self, request: &QueryRequest) -> Self {
        let text = request.text("q").and_then(|q| {
            let phrase = q.replace('-', " ");
            let phrase = phrase.trim();
            (!phrase.is_empty()).then(|| TextPredicate::phrase(phrase))
        });
        Self { text, ..self }
    }

    pub fn apply_pagination(self, request: &QueryRequest, defaults: &PlanDefaults) -> Self {
        let page = positive_param(request, "page").unwrap_or(defaults.page);
        let limit = positive_param(request, "limit").unwrap_or(defaults.limit);
        Self {
            window: Some(Window::page(page, limit)),
            ..self
        }
    }

    pub fn with_filter(self, filter: FilterExpression) -> Self {
        Self { filter, ..self }
    }

    pub fn with_sort(self, sort: Vec<SortKey>) -> Self {
        Self { sort, ..self }
    }

    pub fn with_projection(self, projection: Projection) -> Self {
        Self { projection, ..self }
    }

    pub fn with_text(self, text: TextPredicate) -> Self {
        Self {
            text: Some(text),
            ..self
        }
    }

    pub fn with_window(self, window: Window) -> Self {
        Self {
            window: Some(window),
            ..self
        }
    }

    /// Feed the plan into a query handle in stage order.
    pub fn apply<H: QueryHandle>(&self, handle: H) -> H {
        let mut handle = handle.filter(&self.filter);
        if !self.sort.is_empty() {
            handle = handle.sort(&self.sort);
        }
        handle = handle.select(&self.projection);
        if let Some(text) = &self.text {
            handle = handle.text_search(text);
        }
        if let Some(window) = self.window {
            handle = handle.skip_limit(window.skip, window.limit);
        }
        handle
    }
}

/// Leading base-10 integer of a parameter, if strictly positive.
fn positive_param(request: &QueryRequest, key: &str) -> Option<u64> {
    request
        .text(key)
        .and_then(|text| parse_leading_int(&text))
        .filter(|value| *value > 0)
        .and_then(|value| u64::try_from(value).ok())
}

/// `"5abc"` parses as 5, `"abc"` as nothing.
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
