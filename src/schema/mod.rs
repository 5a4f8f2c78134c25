//! Collection schemas
//!
//! Schemas are declared when a collection is defined and enforced on every
//! local write.
//!
//! # Design Principles
//!
//! - Collection hooks may augment a schema, never silently replace a field
//! - Violations abort writes
//! - No nulls or coercion; defaults only where a field declares one
//! - Deterministic validation

mod errors;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity, ValidationDetails};
pub use types::{FieldDef, FieldType, Schema, META_FIELDS};
pub use validator::SchemaValidator;
