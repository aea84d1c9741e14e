//! Error types for the schema store and its backends

use tabula_fields::FieldsError;
use tabula_order::OrderError;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised by the schema store, section manager and backends
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Bad or missing input; nothing was changed
    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("unknown field kind: {kind}")]
    UnknownKind { kind: String },

    /// The operation would orphan fields that reference this one
    #[error("field '{field}' is referenced by {}", dependents.join(", "))]
    Dependency {
        field: String,
        dependents: Vec<String>,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// The persistence boundary rejected a call
    #[error("{operation} failed: {message}")]
    Persistence { operation: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),
}

impl SchemaError {
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

    /// Create a persistence error for a named boundary operation
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::UnknownKind { .. })
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Boundary failures; these trigger a refetch in the store.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Io(_) | Self::Yaml(_))
    }
}

impl From<FieldsError> for SchemaError {
    fn from(error: FieldsError) -> Self {
        match error {
            FieldsError::Validation { field, message } => Self::Validation { field, message },
            FieldsError::UnknownKind { kind } => Self::UnknownKind { kind },
            FieldsError::Dependency { field, dependents } => Self::Dependency { field, dependents },
            FieldsError::NotFound { resource, id } => Self::NotFound { resource, id },
        }
    }
}

impl From<OrderError> for SchemaError {
    fn from(error: OrderError) -> Self {
        match error {
            OrderError::ItemNotFound { id } => Self::not_found("item", id),
            OrderError::NotInContainer { id } => {
                Self::validation(id, "not part of the container being reordered")
            }
        }
    }
}

impl From<figment::Error> for SchemaError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_errors_keep_their_category() {
        let err: SchemaError = FieldsError::validation("Status", "at least one choice").into();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "validation failed for 'Status': at least one choice"
        );

        let err: SchemaError = FieldsError::Dependency {
            field: "Customer".into(),
            dependents: vec!["Email".into(), "Phone".into()],
        }
        .into();
        assert!(err.is_dependency());
        assert_eq!(err.to_string(), "field 'Customer' is referenced by Email, Phone");
    }

    #[test]
    fn unknown_reorder_item_is_not_found() {
        let err: SchemaError = OrderError::ItemNotFound { id: "fld_1".into() }.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn io_counts_as_persistence() {
        let err: SchemaError = std::io::Error::other("disk full").into();
        assert!(err.is_persistence());
        assert!(SchemaError::persistence("save_field", "offline").is_persistence());
        assert!(!SchemaError::validation("x", "y").is_persistence());
    }
}
