//! Static description of the stored collections.

use jobboard_query::PlanDefaults;

/// Storage type of a top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Timestamp,
    Boolean,
    StringArray,
    ObjectArray,
    Object,
}

impl FieldKind {
    /// Whether a single comparable value lives at this field.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Number | FieldKind::Timestamp | FieldKind::Boolean
        )
    }
}

/// A collection's name, field types and query defaults.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Fields searched by text predicates.
    pub text_fields: &'static [&'static str],
    /// Fields no two documents may share.
    pub unique_fields: &'static [&'static str],
    /// Fields left out of query results unless requested by name.
    pub hidden_fields: &'static [&'static str],
    /// Timestamp sorted descending when a request names no sort.
    pub default_sort: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
}

impl CollectionSchema {
    /// Kind of a top-level field. Nested paths have none.
    pub fn kind_of(&self, path: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, kind)| *kind)
    }

    pub fn plan_defaults(&self) -> PlanDefaults {
        PlanDefaults::sorted_by(self.default_sort)
    }
}

pub const JOBS: CollectionSchema = CollectionSchema {
    name: "jobs",
    text_fields: &["title", "description"],
    unique_fields: &[],
    hidden_fields: &["applicantsApplied"],
    default_sort: "postingDate",
    fields: &[
        ("_id", FieldKind::String),
        ("__v", FieldKind::Number),
        ("title", FieldKind::String),
        ("slug", FieldKind::String),
        ("description", FieldKind::String),
        ("email", FieldKind::String),
        ("address", FieldKind::String),
        ("location", FieldKind::Object),
        ("company", FieldKind::String),
        ("industry", FieldKind::StringArray),
        ("jobType", FieldKind::String),
        ("minEducation", FieldKind::String),
        ("positions", FieldKind::Number),
        ("experience", FieldKind::String),
        ("salary", FieldKind::Number),
        ("postingDate", FieldKind::Timestamp),
        ("lastDate", FieldKind::Timestamp),
        ("user", FieldKind::String),
        ("applicantsApplied", FieldKind::ObjectArray),
    ],
};

pub const USERS: CollectionSchema = CollectionSchema {
    name: "users",
    text_fields: &["name", "email"],
    unique_fields: &["email"],
    hidden_fields: &["password", "resetPasswordToken", "resetPasswordExpire"],
    default_sort: "createdAt",
    fields: &[
        ("_id", FieldKind::String),
        ("__v", FieldKind::Number),
        ("name", FieldKind::String),
        ("email", FieldKind::String),
        ("role", FieldKind::String),
        ("password", FieldKind::String),
        ("createdAt", FieldKind::Timestamp),
        ("resetPasswordToken", FieldKind::String),
        ("resetPasswordExpire", FieldKind::Timestamp),
    ],
};
