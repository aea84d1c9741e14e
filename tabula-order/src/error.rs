//! Error types for reorder planning

use thiserror::Error;

/// Result type for reorder operations
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors that can occur while planning a reorder
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The moved item is not in any known container
    #[error("item not found: {id}")]
    ItemNotFound { id: String },

    /// An explicit ordering named an item outside the container
    #[error("item {id} is not in the container being reordered")]
    NotInContainer { id: String },
}
