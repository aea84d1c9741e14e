//! Error types for field rules

use thiserror::Error;

/// Result type for field operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Errors raised while validating field definitions and their relationships
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldsError {
    /// Bad or missing input; nothing was changed
    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// A kind name that the registry does not know
    #[error("unknown field kind: {kind}")]
    UnknownKind { kind: String },

    /// The operation would orphan fields that reference this one
    #[error("field '{field}' is referenced by {}", dependents.join(", "))]
    Dependency {
        field: String,
        dependents: Vec<String>,
    },

    /// A referenced field, section or table does not exist
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },
}

impl FieldsError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}
