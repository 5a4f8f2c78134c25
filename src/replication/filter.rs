//! # Filter Document
//!
//! Server-side filters scoping replication to one model and one owner.
//!
//! Rules are kept as data and only rendered to the store's predicate source
//! when the design document is written. Installation is idempotent: a stored
//! document is overwritten only when its version is strictly lower than the
//! candidate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::RemoteResult;
use super::remote::{DocumentStore, RemoteConnector, RemoteTarget};
use crate::observability::{log_event, Event, Logger};

/// Identifier of the design document holding the filters
pub const DESIGN_DOC_ID: &str = "_design/app";

/// Filter matching on model only
pub const FILTER_BY_MODEL: &str = "by_model";

/// Filter matching on model and owner; used by every sync session
pub const FILTER_BY_MODEL_AND_USER_ID: &str = "by_model_and_user_id";

/// Current filter document version
pub const FILTER_VERSION: u64 = 1;

/// Document field carrying the model tag
pub const MODEL_FIELD: &str = "rx_model";

/// Document field carrying the owner id
pub const OWNER_FIELD: &str = "user_id";

/// Query parameter carrying the model name
pub const MODEL_PARAM: &str = "model";

/// Query parameter carrying the user id
pub const USER_ID_PARAM: &str = "user_id";

/// Comparison between a document field and a request query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
}

impl FilterOp {
    fn js_operator(&self) -> &'static str {
        match self {
            FilterOp::Eq => "===",
            FilterOp::Neq => "!==",
        }
    }
}

/// `doc[field] <op> req.query[param]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    pub param: String,
}

impl FilterClause {
    pub fn eq(field: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            param: param.into(),
        }
    }

    fn matches(&self, doc: &Value, query: &Map<String, Value>) -> bool {
        let field = doc.get(&self.field);
        let param = query.get(&self.param);
        match self.op {
            FilterOp::Eq => field.is_some() && field == param,
            FilterOp::Neq => field != param,
        }
    }

    fn to_source(&self) -> String {
        format!(
            "doc[{}] {} req.query[{}]",
            js_string(&self.field),
            self.op.js_operator(),
            js_string(&self.param)
        )
    }
}

/// A named replication filter: the design document always passes, other
/// documents pass when every clause holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub clauses: Vec<FilterClause>,
}

impl FilterRule {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// Matches documents of the requested model
    pub fn by_model() -> Self {
        Self::new(vec![FilterClause::eq(MODEL_FIELD, MODEL_PARAM)])
    }

    /// Matches documents of the requested model owned by the requested user
    pub fn by_model_and_user_id() -> Self {
        Self::new(vec![
            FilterClause::eq(MODEL_FIELD, MODEL_PARAM),
            FilterClause::eq(OWNER_FIELD, USER_ID_PARAM),
        ])
    }

    /// Evaluate the rule locally, the way the store would server-side
    pub fn matches(&self, doc: &Value, query: &Map<String, Value>) -> bool {
        if doc.get("_id").and_then(Value::as_str) == Some(DESIGN_DOC_ID) {
            return true;
        }
        self.clauses.iter().all(|clause| clause.matches(doc, query))
    }

    /// Render as the store's `function (doc, req)` predicate source
    pub fn to_source(&self) -> String {
        let design = format!("doc._id === {}", js_string(DESIGN_DOC_ID));
        let body = if self.clauses.is_empty() {
            "true".to_string()
        } else {
            let clauses: Vec<String> = self.clauses.iter().map(FilterClause::to_source).collect();
            format!("({})", clauses.join(" && "))
        };
        format!("function (doc, req) {{ return {} || {}; }}", design, body)
    }
}

/// JSON string literals are valid JavaScript string literals
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// The versioned design document as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub version: u64,
    pub filters: BTreeMap<String, String>,
}

impl FilterDocument {
    pub fn to_value(&self) -> Value {
        // Plain struct with string keys; serialization cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Result of an installation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No document existed; created at the candidate version
    Created,
    /// An older document was overwritten
    Updated { from: u64 },
    /// Stored document is the same or newer; nothing written
    Unchanged { stored: u64 },
}

/// Installs the filter design document on a remote store
#[derive(Debug, Clone)]
pub struct FilterInstaller {
    version: u64,
    rules: BTreeMap<String, FilterRule>,
}

impl Default for FilterInstaller {
    fn default() -> Self {
        Self::new(FILTER_VERSION)
    }
}

impl FilterInstaller {
    /// Installer carrying the standard `by_model` and `by_model_and_user_id`
    /// filters at the given candidate version.
    pub fn new(version: u64) -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(FILTER_BY_MODEL.to_string(), FilterRule::by_model());
        rules.insert(
            FILTER_BY_MODEL_AND_USER_ID.to_string(),
            FilterRule::by_model_and_user_id(),
        );
        Self { version, rules }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rule(&self, name: &str) -> Option<&FilterRule> {
        self.rules.get(name)
    }

    /// The candidate document, without a revision token
    pub fn document(&self) -> FilterDocument {
        FilterDocument {
            id: DESIGN_DOC_ID.to_string(),
            rev: None,
            version: self.version,
            filters: self
                .rules
                .iter()
                .map(|(name, rule)| (name.clone(), rule.to_source()))
                .collect(),
        }
    }

    /// Ensure the design document on `target` is at least this version.
    ///
    /// URL targets are connected through `connector` and the connection is
    /// closed again before returning, whatever the outcome.
    pub async fn install(
        &self,
        target: &RemoteTarget,
        connector: Option<&dyn RemoteConnector>,
    ) -> RemoteResult<InstallOutcome> {
        let (store, ad_hoc) = target.open(connector).await?;
        let result = self.install_into(store.as_ref()).await;

        if ad_hoc {
            if let Err(e) = store.close().await {
                Logger::warn(
                    "FILTER_STORE_CLOSE_FAILED",
                    &[("remote", &target.to_string()), ("reason", &e.to_string())],
                );
            }
        }

        result
    }

    async fn install_into(&self, store: &dyn DocumentStore) -> RemoteResult<InstallOutcome> {
        let mut doc = self.document();
        let version = self.version.to_string();

        let existing = match store.get(DESIGN_DOC_ID).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => {
                store.put(doc.to_value()).await?;
                log_event(
                    Event::FilterInstallComplete,
                    &[("version", &version), ("outcome", "created")],
                );
                return Ok(InstallOutcome::Created);
            }
            Err(e) => return Err(e),
        };

        // Documents without a readable version predate versioning
        let stored = existing.get("version").and_then(Value::as_u64).unwrap_or(0);
        if stored >= self.version {
            log_event(Event::FilterInstallUnchanged, &[("stored", &stored.to_string())]);
            return Ok(InstallOutcome::Unchanged { stored });
        }

        doc.rev = existing
            .get("_rev")
            .and_then(Value::as_str)
            .map(str::to_string);
        store.put(doc.to_value()).await?;
        log_event(Event::FilterInstallComplete, &[("version", &version), ("outcome", "updated")]);
        Ok(InstallOutcome::Updated { from: stored })
    }
}
