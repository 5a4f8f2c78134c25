//! # Database Errors

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for local database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Local database errors
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// Collection definition or document rejected by its schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Collection not defined
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Insert with an `_id` that already exists
    #[error("Document already exists: {0}")]
    DocumentExists(String),

    /// Document is not a JSON object or has an unusable `_id`
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl DatabaseError {
    /// Whether the error comes from a misconfigured collection definition
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, DatabaseError::Schema(e) if e.is_configuration_error())
    }
}
