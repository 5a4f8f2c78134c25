//! # Local Database
//!
//! Owns collections, the hooks applied to them, and the replication groups
//! started from them.
//!
//! Hooks are composed explicitly with [`DatabaseBuilder::hook`]:
//!
//! ```ignore
//! let db = Database::builder()
//!     .hook(ReplicationFields)
//!     .hook(Timestamps::default())
//!     .replication_backend(ReplicationBackend::new(engine))
//!     .build();
//! ```

mod collection;
mod errors;
mod hooks;
mod timestamps;

pub use collection::{Collection, CollectionDef};
pub use errors::{DatabaseError, DatabaseResult};
pub use hooks::{CollectionHook, ReplicationFields};
pub use timestamps::{Timestamps, CREATED_AT_FIELD, UPDATED_AT_FIELD};

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::observability::{log_event, Event};
use crate::replication::{
    RemoteTarget, ReplicationBackend, ReplicationError, ReplicationGroup, ReplicationOptions,
    ReplicationRegistry, ReplicationResult, SyncDirection, MODEL_FIELD,
};
use crate::schema::{Schema, SchemaError};

/// Builder for [`Database`]
#[derive(Default)]
pub struct DatabaseBuilder {
    hooks: Vec<Arc<dyn CollectionHook>>,
    backend: Option<ReplicationBackend>,
}

impl DatabaseBuilder {
    /// Append a hook. Hooks run in the order they are added.
    pub fn hook(mut self, hook: impl CollectionHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn replication_backend(mut self, backend: ReplicationBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Database {
        Database {
            hooks: self.hooks,
            backend: self.backend,
            collections: RwLock::new(Vec::new()),
            registry: Arc::new(ReplicationRegistry::new()),
        }
    }
}

/// An in-process database
pub struct Database {
    hooks: Vec<Arc<dyn CollectionHook>>,
    backend: Option<ReplicationBackend>,
    /// Definition order
    collections: RwLock<Vec<Arc<Collection>>>,
    registry: Arc<ReplicationRegistry>,
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Define a collection.
    ///
    /// Every hook sees the definition before the collection exists. If any
    /// hook rejects it, nothing is created.
    pub fn create_collection(
        &self,
        name: &str,
        schema: Schema,
    ) -> DatabaseResult<Arc<Collection>> {
        if name.trim().is_empty() {
            return Err(SchemaError::collection_name_required().into());
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if collections.iter().any(|c| c.name() == name) {
            return Err(SchemaError::collection_exists(name).into());
        }

        let mut def = CollectionDef::new(name, schema);
        for hook in &self.hooks {
            if let Err(e) = hook.define(&mut def) {
                log_event(
                    Event::CollectionRejected,
                    &[("collection", name), ("hook", hook.name()), ("code", e.code().code())],
                );
                return Err(e.into());
            }
        }

        if let Err(reason) = def.schema.validate_structure() {
            return Err(SchemaError::invalid_schema(name, reason).into());
        }

        let collection = Arc::new(Collection::new(def, self.hooks.clone()));
        collections.push(Arc::clone(&collection));

        log_event(
            Event::CollectionCreated,
            &[("collection", name), ("fields", &collection.schema().fields.len().to_string())],
        );
        Ok(collection)
    }

    pub fn collection(&self, name: &str) -> DatabaseResult<Arc<Collection>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| DatabaseError::CollectionNotFound(name.to_string()))
    }

    /// Collection names in definition order
    pub fn collections(&self) -> Vec<String> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Create, register and connect a replication group.
    ///
    /// `names` selects collections by name; `None` selects all of them. A
    /// filter installation failure does not fail this call: the group is
    /// returned in the retrying state. A session that fails to open is
    /// returned as an error and the group is left closed and registered.
    pub async fn replicate(
        &self,
        remote: impl Into<RemoteTarget>,
        names: Option<&[&str]>,
        direction: SyncDirection,
        options: ReplicationOptions,
    ) -> ReplicationResult<Arc<ReplicationGroup>> {
        let backend = self.backend.clone().ok_or_else(|| {
            ReplicationError::configuration_error("no replication backend configured")
        })?;
        let collections = self.select(names)?;

        let group = ReplicationGroup::new(
            remote.into(),
            collections,
            direction,
            options,
            backend,
            Some(Arc::downgrade(&self.registry)),
        )?;
        self.registry.register(Arc::clone(&group));

        group.connect().await?;
        Ok(group)
    }

    fn select(&self, names: Option<&[&str]>) -> ReplicationResult<Vec<Arc<Collection>>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let selected: Vec<Arc<Collection>> = match names {
            None => collections.to_vec(),
            Some(names) => names
                .iter()
                .map(|name| {
                    collections.iter().find(|c| c.name() == *name).cloned().ok_or_else(|| {
                        ReplicationError::configuration_error(format!(
                            "unknown collection: {}",
                            name
                        ))
                    })
                })
                .collect::<ReplicationResult<_>>()?,
        };

        if let Some(untagged) = selected
            .iter()
            .find(|c| c.schema().field(MODEL_FIELD).is_none())
        {
            return Err(ReplicationError::configuration_error(format!(
                "collection {} has no {} field; build the database with ReplicationFields",
                untagged.name(),
                MODEL_FIELD
            )));
        }
        Ok(selected)
    }

    /// Live replication groups in creation order
    pub fn replications(&self) -> Vec<Arc<ReplicationGroup>> {
        self.registry.all()
    }

    pub fn registry(&self) -> &Arc<ReplicationRegistry> {
        &self.registry
    }

    /// Destroy every replication group started from this database
    pub async fn destroy_replications(&self) -> usize {
        self.registry.destroy_all().await
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("collections", &self.collections())
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("replications", &self.registry.len())
            .finish()
    }
}
