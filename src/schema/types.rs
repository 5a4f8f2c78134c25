//! Collection schema type definitions
//!
//! Supported types:
//! - string: UTF-8 string, optionally restricted to an enum of values
//! - int: 64-bit signed integer
//! - bool: Boolean
//! - float: 64-bit floating point
//! - object: Nested object with field schema
//! - array: Homogeneous array with element type

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Document metadata keys owned by the store, never declared in a schema.
pub const META_FIELDS: [&str; 2] = ["_id", "_rev"];

/// Supported field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// 64-bit floating point
    Float,
    /// Nested object with its own field schema
    Object {
        /// Nested field definitions
        fields: HashMap<String, FieldDef>,
    },
    /// Homogeneous array with single element type
    Array {
        /// Element type (boxed to allow recursive types)
        #[serde(rename = "element_type")]
        element_type: Box<FieldType>,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Float => "float",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field data type
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether field must be present
    pub required: bool,
    /// Allowed values for string fields
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Value filled in on insert when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDef {
    fn of(field_type: FieldType, required: bool) -> Self {
        Self {
            field_type,
            required,
            enum_values: None,
            default: None,
        }
    }

    /// Create a required string field
    pub fn required_string() -> Self {
        Self::of(FieldType::String, true)
    }

    /// Create an optional string field
    pub fn optional_string() -> Self {
        Self::of(FieldType::String, false)
    }

    /// Create a required int field
    pub fn required_int() -> Self {
        Self::of(FieldType::Int, true)
    }

    /// Create an optional int field
    pub fn optional_int() -> Self {
        Self::of(FieldType::Int, false)
    }

    /// Create a required bool field
    pub fn required_bool() -> Self {
        Self::of(FieldType::Bool, true)
    }

    /// Create a required float field
    pub fn required_float() -> Self {
        Self::of(FieldType::Float, true)
    }

    /// Create a required object field
    pub fn required_object(fields: HashMap<String, FieldDef>) -> Self {
        Self::of(FieldType::Object { fields }, true)
    }

    /// Create an optional array field
    pub fn optional_array(element_type: FieldType) -> Self {
        Self::of(
            FieldType::Array {
                element_type: Box::new(element_type),
            },
            false,
        )
    }

    /// Create a required string field restricted to a single value, which is
    /// also its insert default.
    pub fn string_constant(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            field_type: FieldType::String,
            required: true,
            enum_values: Some(vec![value.clone()]),
            default: Some(Value::String(value)),
        }
    }

    /// Restrict a string field to the given values
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the insert default
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Schema of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version, bumped by the application on breaking changes
    #[serde(default)]
    pub version: u32,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field definitions
    pub fields: HashMap<String, FieldDef>,
}

impl Schema {
    /// Create a new version 0 schema
    pub fn new(fields: HashMap<String, FieldDef>) -> Self {
        Self {
            version: 0,
            description: None,
            fields,
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Returns the field definition for `name`, if declared
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Validates the schema structure itself (not a document)
    pub fn validate_structure(&self) -> Result<(), String> {
        for meta in META_FIELDS {
            if self.fields.contains_key(meta) {
                return Err(format!("'{}' is managed by the store and must not be declared", meta));
            }
        }

        for (name, def) in &self.fields {
            if let Some(values) = &def.enum_values {
                if def.field_type != FieldType::String {
                    return Err(format!("enum on '{}' requires a string field", name));
                }
                if values.is_empty() {
                    return Err(format!("enum on '{}' must list at least one value", name));
                }
            }
            if let (Some(default), Some(values)) = (&def.default, &def.enum_values) {
                let allowed = default
                    .as_str()
                    .map(|d| values.iter().any(|v| v == d))
                    .unwrap_or(false);
                if !allowed {
                    return Err(format!("default of '{}' is not one of its enum values", name));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> Schema {
        Schema::new(HashMap::new())
            .with_field("title", FieldDef::required_string())
            .with_field("done", FieldDef::required_bool())
            .with_field("priority", FieldDef::optional_int())
    }

    #[test]
    fn test_schema_structure_valid() {
        assert!(sample_schema().validate_structure().is_ok());
    }

    #[test]
    fn test_meta_fields_cannot_be_declared() {
        let schema = sample_schema().with_field("_id", FieldDef::required_string());
        let result = schema.validate_structure();
        assert!(result.unwrap_err().contains("_id"));
    }

    #[test]
    fn test_enum_requires_string_field() {
        let schema = sample_schema().with_field("n", FieldDef::required_int().with_enum(["a"]));
        assert!(schema.validate_structure().is_err());
    }

    #[test]
    fn test_enum_default_must_be_member() {
        let schema = sample_schema().with_field(
            "kind",
            FieldDef::required_string()
                .with_enum(["a", "b"])
                .with_default(json!("c")),
        );
        assert!(schema.validate_structure().is_err());
    }

    #[test]
    fn test_string_constant() {
        let def = FieldDef::string_constant("tasks");
        assert!(def.required);
        assert_eq!(def.enum_values, Some(vec!["tasks".to_string()]));
        assert_eq!(def.default, Some(json!("tasks")));
    }

    #[test]
    fn test_schema_deserializes_enum_key() {
        let schema: Schema = serde_json::from_value(json!({
            "fields": {
                "kind": { "type": "string", "required": true, "enum": ["x"] }
            }
        }))
        .unwrap();
        assert_eq!(schema.version, 0);
        assert_eq!(
            schema.field("kind").unwrap().enum_values,
            Some(vec!["x".to_string()])
        );
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::String.type_name(), "string");
        assert_eq!(FieldType::Int.type_name(), "int");
        assert_eq!(
            FieldType::Array {
                element_type: Box::new(FieldType::String)
            }
            .type_name(),
            "array"
        );
    }
}
