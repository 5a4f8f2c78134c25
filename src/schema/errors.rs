//! Schema error types
//!
//! Error codes:
//! - AERO_COLLECTION_NAME_REQUIRED (FATAL)
//! - AERO_COLLECTION_EXISTS (FATAL)
//! - AERO_SCHEMA_INVALID (FATAL)
//! - AERO_SCHEMA_RESERVED_FIELD (FATAL)
//! - AERO_SCHEMA_VALIDATION_FAILED (REJECT)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Document write rejected
    Reject,
    /// Collection definition is misconfigured and cannot be created
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Collection defined without a name
    AeroCollectionNameRequired,
    /// Collection name already defined
    AeroCollectionExists,
    /// Schema structure is invalid
    AeroSchemaInvalid,
    /// Schema declares a field reserved by a collection hook
    AeroSchemaReservedField,
    /// Document violates schema
    AeroSchemaValidationFailed,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::AeroCollectionNameRequired => "AERO_COLLECTION_NAME_REQUIRED",
            SchemaErrorCode::AeroCollectionExists => "AERO_COLLECTION_EXISTS",
            SchemaErrorCode::AeroSchemaInvalid => "AERO_SCHEMA_INVALID",
            SchemaErrorCode::AeroSchemaReservedField => "AERO_SCHEMA_RESERVED_FIELD",
            SchemaErrorCode::AeroSchemaValidationFailed => "AERO_SCHEMA_VALIDATION_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::AeroSchemaValidationFailed => Severity::Reject,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Validation failure details
#[derive(Debug, Clone)]
pub struct ValidationDetails {
    /// Field path (e.g., "address.city")
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, "field to be present", "missing")
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self::new(field, "no undeclared fields", "extra field present")
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, "non-null value", "null")
    }

    pub fn not_in_enum(field: impl Into<String>, allowed: &[String], actual: &str) -> Self {
        Self::new(field, format!("one of [{}]", allowed.join(", ")), format!("'{}'", actual))
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': expected {}, got {}", self.field, self.expected, self.actual)
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    collection: Option<String>,
    field: Option<String>,
    details: Option<ValidationDetails>,
}

impl SchemaError {
    fn new(code: SchemaErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            collection: None,
            field: None,
            details: None,
        }
    }

    /// Create a missing collection name error
    pub fn collection_name_required() -> Self {
        Self::new(
            SchemaErrorCode::AeroCollectionNameRequired,
            "Collection definitions require a non-empty name".into(),
        )
    }

    /// Create a duplicate collection error
    pub fn collection_exists(collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let mut err = Self::new(
            SchemaErrorCode::AeroCollectionExists,
            format!("Collection '{}' is already defined", collection),
        );
        err.collection = Some(collection);
        err
    }

    /// Create a malformed schema error
    pub fn invalid_schema(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        let collection = collection.into();
        let mut err = Self::new(
            SchemaErrorCode::AeroSchemaInvalid,
            format!("Schema for '{}' is invalid: {}", collection, reason.into()),
        );
        err.collection = Some(collection);
        err
    }

    /// Create a reserved field collision error
    pub fn reserved_field(collection: impl Into<String>, field: impl Into<String>) -> Self {
        let collection = collection.into();
        let field = field.into();
        let mut err = Self::new(
            SchemaErrorCode::AeroSchemaReservedField,
            format!(
                "Schema for '{}' declares '{}', which is reserved and added automatically",
                collection, field
            ),
        );
        err.collection = Some(collection);
        err.field = Some(field);
        err
    }

    /// Create a validation failed error
    pub fn validation_failed(collection: impl Into<String>, details: ValidationDetails) -> Self {
        let collection = collection.into();
        let mut err = Self::new(
            SchemaErrorCode::AeroSchemaValidationFailed,
            format!("Document validation failed: {}", details),
        );
        err.collection = Some(collection);
        err.field = Some(details.field.clone());
        err.details = Some(details);
        err
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the collection name if applicable
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Returns the offending field if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns validation details if applicable
    pub fn details(&self) -> Option<&ValidationDetails> {
        self.details.as_ref()
    }

    /// Returns whether this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
