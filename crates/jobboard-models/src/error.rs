//! Model validation errors.

use thiserror::Error;
use validator::ValidationErrors;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// One message per violated rule.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
}

impl ModelError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn messages(&self) -> &[String] {
        match self {
            Self::Validation(messages) => messages,
        }
    }
}

/// Flatten derive-validation errors into their messages, ordered by field.
pub(crate) fn collect_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(_, errors)| errors.iter())
        .map(|error| {
            error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| error.code.to_string())
        })
        .collect()
}
