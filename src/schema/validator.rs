//! Document validation against a collection schema
//!
//! Validation semantics:
//! - All required fields are present
//! - No undeclared fields exist (store metadata `_id`/`_rev` excepted)
//! - Field types exactly match schema types
//! - Enum-restricted strings hold an allowed value
//!
//! Forbidden:
//! - Implicit type coercion
//! - Null values
//! - Partial validation

use serde_json::Value;
use std::collections::HashMap;

use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use super::types::{FieldDef, FieldType, Schema, META_FIELDS};

/// Validator bound to one collection's schema.
///
/// Does not mutate documents; defaults are applied by the collection before
/// validation.
pub struct SchemaValidator<'a> {
    collection: &'a str,
    schema: &'a Schema,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(collection: &'a str, schema: &'a Schema) -> Self {
        Self { collection, schema }
    }

    /// Validates a whole document.
    ///
    /// # Errors
    ///
    /// Returns `AERO_SCHEMA_VALIDATION_FAILED` on the first violation found.
    pub fn validate_document(&self, document: &Value) -> SchemaResult<()> {
        let doc_obj = document.as_object().ok_or_else(|| {
            self.fail(ValidationDetails::new("$root", "object", json_type_name(document)))
        })?;

        self.validate_object(doc_obj, &self.schema.fields, "")
    }

    fn validate_object(
        &self,
        obj: &serde_json::Map<String, Value>,
        fields: &HashMap<String, FieldDef>,
        path_prefix: &str,
    ) -> SchemaResult<()> {
        for key in obj.keys() {
            let is_meta = path_prefix.is_empty() && META_FIELDS.contains(&key.as_str());
            if !is_meta && !fields.contains_key(key) {
                return Err(self.fail(ValidationDetails::extra_field(make_path(path_prefix, key))));
            }
        }

        for (field_name, field_def) in fields {
            let field_path = make_path(path_prefix, field_name);

            match obj.get(field_name) {
                Some(Value::Null) => {
                    return Err(self.fail(ValidationDetails::null_value(field_path)));
                }
                Some(value) => {
                    self.validate_value(value, &field_def.field_type, &field_path)?;
                    if let (Some(allowed), Some(actual)) =
                        (&field_def.enum_values, value.as_str())
                    {
                        if !allowed.iter().any(|v| v == actual) {
                            return Err(self.fail(ValidationDetails::not_in_enum(
                                field_path, allowed, actual,
                            )));
                        }
                    }
                }
                None if field_def.required => {
                    return Err(self.fail(ValidationDetails::missing_field(field_path)));
                }
                None => {}
            }
        }

        Ok(())
    }

    fn validate_value(
        &self,
        value: &Value,
        expected_type: &FieldType,
        field_path: &str,
    ) -> SchemaResult<()> {
        let matches = match expected_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            // Integers are acceptable floats
            FieldType::Float => value.is_number(),
            FieldType::Object { fields } => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| self.type_error(field_path, "object", value))?;
                return self.validate_object(obj, fields, field_path);
            }
            FieldType::Array { element_type } => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| self.type_error(field_path, "array", value))?;
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}[{}]", field_path, i);
                    if elem.is_null() {
                        return Err(self.fail(ValidationDetails::null_value(elem_path)));
                    }
                    self.validate_value(elem, element_type, &elem_path)?;
                }
                return Ok(());
            }
        };

        if matches {
            Ok(())
        } else {
            Err(self.type_error(field_path, expected_type.type_name(), value))
        }
    }

    fn type_error(&self, field_path: &str, expected: &str, actual: &Value) -> SchemaError {
        self.fail(ValidationDetails::new(field_path, expected, json_type_name(actual)))
    }

    fn fail(&self, details: ValidationDetails) -> SchemaError {
        SchemaError::validation_failed(self.collection, details)
    }
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
