//! Collection Hook Tests
//!
//! Collection definitions and writes pass through the hooks a database is
//! built with:
//! - Reserved replication fields are rejected before the collection exists
//! - The model tag and owner id are injected into every schema
//! - The model tag is filled in and pinned on write
//! - Timestamps are stamped on insert and update

use std::collections::HashMap;

use aerodb_sync::database::{
    DatabaseError, ReplicationFields, Timestamps, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use aerodb_sync::replication::{FilterRule, SyncQuery, MODEL_FIELD, OWNER_FIELD};
use aerodb_sync::schema::{FieldDef, FieldType, Schema, SchemaErrorCode};
use aerodb_sync::Database;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> Database {
    Database::builder()
        .hook(ReplicationFields)
        .hook(Timestamps::default())
        .build()
}

fn task_schema() -> Schema {
    Schema::new(HashMap::new())
        .with_field("title", FieldDef::required_string())
        .with_field("done", FieldDef::required_bool())
}

fn schema_code(err: &DatabaseError) -> Option<SchemaErrorCode> {
    match err {
        DatabaseError::Schema(e) => Some(e.code()),
        _ => None,
    }
}

// =============================================================================
// Definition Tests
// =============================================================================

/// Owner id declared with a non-string type is rejected; nothing is created.
#[test]
fn test_reserved_owner_field_rejected() {
    let db = setup();
    let schema = task_schema().with_field(OWNER_FIELD, FieldDef::required_int());

    let err = db.create_collection("tasks", schema).unwrap_err();
    assert_eq!(schema_code(&err), Some(SchemaErrorCode::AeroSchemaReservedField));
    assert!(err.is_configuration_error());
    assert!(db.collection("tasks").is_err());
    assert!(db.collections().is_empty());
}

/// Model tag may not be declared either, whatever its type.
#[test]
fn test_reserved_model_field_rejected() {
    let db = setup();
    let schema = task_schema().with_field(MODEL_FIELD, FieldDef::required_string());

    let err = db.create_collection("tasks", schema).unwrap_err();
    assert_eq!(schema_code(&err), Some(SchemaErrorCode::AeroSchemaReservedField));
}

/// Timestamp fields are reserved by their hook.
#[test]
fn test_reserved_timestamp_field_rejected() {
    let db = setup();
    let schema = task_schema().with_field(CREATED_AT_FIELD, FieldDef::optional_string());

    let err = db.create_collection("tasks", schema).unwrap_err();
    assert_eq!(schema_code(&err), Some(SchemaErrorCode::AeroSchemaReservedField));
}

/// Every collection gets the model tag and owner id.
#[test]
fn test_fields_are_injected() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();
    let notes = db.create_collection("notes", Schema::new(HashMap::new())).unwrap();

    let model = tasks.schema().field(MODEL_FIELD).unwrap();
    assert_eq!(model.field_type, FieldType::String);
    assert_eq!(model.enum_values, Some(vec!["tasks".to_string()]));
    assert_eq!(model.default, Some(json!("tasks")));

    let notes_model = notes.schema().field(MODEL_FIELD).unwrap();
    assert_eq!(notes_model.enum_values, Some(vec!["notes".to_string()]));

    let owner = tasks.schema().field(OWNER_FIELD).unwrap();
    assert_eq!(owner.field_type, FieldType::String);
    assert!(owner.required);
}

/// Without the hook, schemas are left as declared.
#[test]
fn test_plain_database_adds_nothing() {
    let db = Database::builder().build();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();

    assert!(tasks.schema().field(MODEL_FIELD).is_none());
    assert!(tasks.schema().field(OWNER_FIELD).is_none());
    assert_eq!(tasks.schema().fields.len(), 2);
}

// =============================================================================
// Write Tests
// =============================================================================

/// Inserting without a model tag fills it in from the collection name.
#[test]
fn test_model_tag_defaults_on_insert() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();

    let id = tasks
        .insert(json!({ "title": "write tests", "done": false, "user_id": "u1" }))
        .unwrap();
    let doc = tasks.get(&id).unwrap();

    assert_eq!(doc[MODEL_FIELD], json!("tasks"));
    assert_eq!(doc[OWNER_FIELD], json!("u1"));
}

/// A foreign model tag cannot be written.
#[test]
fn test_foreign_model_tag_rejected() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();

    let err = tasks
        .insert(json!({ "title": "x", "done": false, "user_id": "u1", "rx_model": "notes" }))
        .unwrap_err();
    assert_eq!(schema_code(&err), Some(SchemaErrorCode::AeroSchemaValidationFailed));
    assert!(tasks.is_empty());
}

/// Owner id is required on every document.
#[test]
fn test_owner_id_required() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();

    let err = tasks.insert(json!({ "title": "x", "done": false })).unwrap_err();
    assert_eq!(schema_code(&err), Some(SchemaErrorCode::AeroSchemaValidationFailed));
}

/// Stored documents match the filter for their own model and owner only.
#[test]
fn test_stored_documents_match_replication_filter() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();
    let id = tasks
        .insert(json!({ "title": "x", "done": true, "user_id": "u1" }))
        .unwrap();
    let doc = tasks.get(&id).unwrap();

    let rule = FilterRule::by_model_and_user_id();
    let own = SyncQuery {
        model: "tasks".into(),
        user_id: Some("u1".into()),
    };
    let other = SyncQuery {
        model: "tasks".into(),
        user_id: Some("u2".into()),
    };
    assert!(rule.matches(&doc, &own.to_map()));
    assert!(!rule.matches(&doc, &other.to_map()));
}

/// Insert stamps both timestamps; update keeps created_at.
#[test]
fn test_timestamps_on_insert_and_update() {
    let db = setup();
    let tasks = db.create_collection("tasks", task_schema()).unwrap();

    let id = tasks
        .insert(json!({ "title": "x", "done": false, "user_id": "u1" }))
        .unwrap();
    let inserted = tasks.get(&id).unwrap();
    let created = inserted[CREATED_AT_FIELD].as_str().unwrap().to_string();
    assert!(created.ends_with('Z'));
    assert_eq!(inserted[UPDATED_AT_FIELD], inserted[CREATED_AT_FIELD]);

    tasks
        .update(
            &id,
            json!({
                "title": "y",
                "done": true,
                "user_id": "u1",
                "rx_model": "tasks",
                "created_at": "1970-01-01T00:00:00.000Z"
            }),
        )
        .unwrap();
    let updated = tasks.get(&id).unwrap();
    assert_eq!(updated[CREATED_AT_FIELD], json!(created));
    assert_eq!(updated["title"], json!("y"));
}
