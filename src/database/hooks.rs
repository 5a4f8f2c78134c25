//! # Collection Hooks
//!
//! Hooks are composed explicitly when the database is built and run, in
//! order, for every collection definition and every local write.

use std::fmt;

use serde_json::{Map, Value};

use super::collection::CollectionDef;
use crate::replication::{MODEL_FIELD, OWNER_FIELD};
use crate::schema::{FieldDef, SchemaError, SchemaResult};

/// Extension point run at collection-definition time and before writes
pub trait CollectionHook: Send + Sync + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Inspect and augment a definition before the collection exists.
    /// Errors abort the definition.
    fn define(&self, def: &mut CollectionDef) -> SchemaResult<()>;

    /// Adjust a document before it is validated and stored. `existing` is the
    /// stored version on update, `None` on insert.
    fn before_write(
        &self,
        _collection: &str,
        _document: &mut Map<String, Value>,
        _existing: Option<&Map<String, Value>>,
    ) {
    }
}

/// Reject a definition that declares any of `fields`
pub(crate) fn reject_reserved(def: &CollectionDef, fields: &[&str]) -> SchemaResult<()> {
    match fields.iter().find(|f| def.schema.fields.contains_key(**f)) {
        Some(field) => Err(SchemaError::reserved_field(&def.name, *field)),
        None => Ok(()),
    }
}

/// Adds the model tag and owner id fields used by filtered replication.
///
/// - `rx_model`: required string, fixed to the collection name and filled
///   in automatically on insert
/// - `user_id`: required free string
///
/// Schemas may not declare either field themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicationFields;

impl CollectionHook for ReplicationFields {
    fn name(&self) -> &'static str {
        "replication_fields"
    }

    fn define(&self, def: &mut CollectionDef) -> SchemaResult<()> {
        reject_reserved(def, &[MODEL_FIELD, OWNER_FIELD])?;

        let model = FieldDef::string_constant(def.name.clone());
        def.schema.fields.insert(MODEL_FIELD.to_string(), model);
        def.schema
            .fields
            .insert(OWNER_FIELD.to_string(), FieldDef::required_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, Schema};
    use std::collections::HashMap;

    fn def(name: &str, schema: Schema) -> CollectionDef {
        CollectionDef::new(name, schema)
    }

    #[test]
    fn test_injects_model_and_owner_fields() {
        let schema = Schema::new(HashMap::new()).with_field("title", FieldDef::required_string());
        let mut d = def("tasks", schema);
        ReplicationFields.define(&mut d).unwrap();

        let model = d.schema.field(MODEL_FIELD).unwrap();
        assert!(model.required);
        assert_eq!(model.enum_values, Some(vec!["tasks".to_string()]));
        assert_eq!(model.default, Some(Value::String("tasks".into())));

        let owner = d.schema.field(OWNER_FIELD).unwrap();
        assert_eq!(owner.field_type, FieldType::String);
        assert!(owner.required);
        assert!(owner.enum_values.is_none());
    }

    #[test]
    fn test_rejects_declared_owner_field() {
        let schema = Schema::new(HashMap::new()).with_field(OWNER_FIELD, FieldDef::required_int());
        let mut d = def("tasks", schema);
        let err = ReplicationFields.define(&mut d).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.field(), Some(OWNER_FIELD));
    }

    #[test]
    fn test_rejects_declared_model_field_even_if_string() {
        let schema =
            Schema::new(HashMap::new()).with_field(MODEL_FIELD, FieldDef::required_string());
        let mut d = def("tasks", schema);
        let err = ReplicationFields.define(&mut d).unwrap_err();
        assert_eq!(err.field(), Some(MODEL_FIELD));
    }

    #[test]
    fn test_rejected_definition_is_left_untouched() {
        let schema = Schema::new(HashMap::new()).with_field(OWNER_FIELD, FieldDef::required_int());
        let mut d = def("tasks", schema);
        let before = d.schema.clone();
        let _ = ReplicationFields.define(&mut d);
        assert_eq!(d.schema, before);
    }
}
