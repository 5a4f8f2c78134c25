//! # Timestamp Fields
//!
//! Adds `created_at` and `updated_at` to every collection and stamps them on
//! local writes as RFC 3339 UTC strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::collection::CollectionDef;
use super::hooks::{reject_reserved, CollectionHook};
use crate::schema::{FieldDef, SchemaResult};

pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Timestamp hook with an injectable clock
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    clock: fn() -> DateTime<Utc>,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl Timestamps {
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }

    fn now(&self) -> Value {
        Value::String((self.clock)().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl CollectionHook for Timestamps {
    fn name(&self) -> &'static str {
        "timestamps"
    }

    fn define(&self, def: &mut CollectionDef) -> SchemaResult<()> {
        reject_reserved(def, &[CREATED_AT_FIELD, UPDATED_AT_FIELD])?;

        // Optional so documents replicated from elsewhere still validate
        def.schema
            .fields
            .insert(CREATED_AT_FIELD.to_string(), FieldDef::optional_string());
        def.schema
            .fields
            .insert(UPDATED_AT_FIELD.to_string(), FieldDef::optional_string());
        Ok(())
    }

    fn before_write(
        &self,
        _collection: &str,
        document: &mut Map<String, Value>,
        existing: Option<&Map<String, Value>>,
    ) {
        let now = self.now();

        let created = existing
            .and_then(|e| e.get(CREATED_AT_FIELD))
            .or_else(|| document.get(CREATED_AT_FIELD))
            .cloned()
            .unwrap_or_else(|| now.clone());

        document.insert(CREATED_AT_FIELD.to_string(), created);
        document.insert(UPDATED_AT_FIELD.to_string(), now);
    }
}
