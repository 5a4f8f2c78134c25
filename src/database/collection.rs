//! # Collections
//!
//! A named, schema-checked set of JSON documents held in memory. Hooks from
//! the owning database run on every write.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{DatabaseError, DatabaseResult};
use super::hooks::CollectionHook;
use crate::schema::{Schema, SchemaValidator};

/// A collection definition as seen by hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
    pub name: String,
    pub schema: Schema,
}

impl CollectionDef {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A local collection
#[derive(Debug)]
pub struct Collection {
    name: String,
    schema: Schema,
    hooks: Vec<Arc<dyn CollectionHook>>,
    documents: RwLock<BTreeMap<String, Value>>,
}

impl Collection {
    pub(crate) fn new(def: CollectionDef, hooks: Vec<Arc<dyn CollectionHook>>) -> Self {
        Self {
            name: def.name,
            schema: def.schema,
            hooks,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema after every hook has run
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Insert a new document and return its `_id`.
    ///
    /// A missing `_id` is generated. Schema defaults fill absent fields, hooks
    /// run, and the result must validate.
    pub fn insert(&self, document: Value) -> DatabaseResult<String> {
        let mut doc = into_object(document)?;

        let id = match doc.get("_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(other) => {
                return Err(DatabaseError::InvalidDocument(format!(
                    "_id must be a non-empty string, got {}",
                    other
                )))
            }
            None => Uuid::new_v4().to_string(),
        };
        doc.insert("_id".into(), Value::String(id.clone()));

        for (field, def) in &self.schema.fields {
            if let Some(default) = &def.default {
                doc.entry(field.clone()).or_insert_with(|| default.clone());
            }
        }

        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        if documents.contains_key(&id) {
            return Err(DatabaseError::DocumentExists(id));
        }

        let doc = self.prepare(doc, None)?;
        documents.insert(id.clone(), doc);
        Ok(id)
    }

    /// Replace an existing document. The stored `_id` always wins.
    pub fn update(&self, id: &str, document: Value) -> DatabaseResult<()> {
        let mut doc = into_object(document)?;
        doc.insert("_id".into(), Value::String(id.to_string()));

        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let existing = documents
            .get(id)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| DatabaseError::DocumentNotFound(id.to_string()))?;

        let doc = self.prepare(doc, Some(&existing))?;
        documents.insert(id.to_string(), doc);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> DatabaseResult<Value> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| DatabaseError::DocumentNotFound(id.to_string()))
    }

    /// All documents ordered by `_id`
    pub fn all(&self) -> Vec<Value> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prepare(
        &self,
        mut doc: Map<String, Value>,
        existing: Option<&Map<String, Value>>,
    ) -> DatabaseResult<Value> {
        for hook in &self.hooks {
            hook.before_write(&self.name, &mut doc, existing);
        }

        let doc = Value::Object(doc);
        SchemaValidator::new(&self.name, &self.schema).validate_document(&doc)?;
        Ok(doc)
    }
}

fn into_object(document: Value) -> DatabaseResult<Map<String, Value>> {
    match document {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}
