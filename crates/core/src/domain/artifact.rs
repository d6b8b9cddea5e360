use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a remote entity (artifact, category, application).
///
/// The generation service is not consistent about whether it sends ids as
/// JSON strings or numbers, so both are accepted and normalized to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawEntityId", into = "String")]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityId {
    Text(String),
    Integer(i64),
    Unsigned(u64),
}

impl From<RawEntityId> for EntityId {
    fn from(raw: RawEntityId) -> Self {
        match raw {
            RawEntityId::Text(s) => Self(s),
            RawEntityId::Integer(n) => Self(n.to_string()),
            RawEntityId::Unsigned(n) => Self(n.to_string()),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated function template.
///
/// Only `id` carries meaning for the orchestrator; the named references are
/// read when building the next continuation request and everything else is
/// kept verbatim in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ref: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_ref: Option<EntityId>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Artifact {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            category_ref: None,
            application_ref: None,
            payload: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category_ref: impl Into<EntityId>) -> Self {
        self.category_ref = Some(category_ref.into());
        self
    }

    pub fn with_application(mut self, application_ref: impl Into<EntityId>) -> Self {
        self.application_ref = Some(application_ref.into());
        self
    }
}

/// Ordered, id-deduplicated record of the artifacts a session produced.
///
/// The first version seen for an id is the one kept in `items`; `latest`
/// always points at whatever was recorded last, duplicate or not.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLedger {
    items: Vec<Artifact>,
    latest: Option<Artifact>,
    #[serde(skip)]
    positions: HashMap<EntityId, usize>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from previously recorded items, e.g. when resuming.
    pub fn seeded(items: Vec<Artifact>, latest: Option<Artifact>) -> Self {
        let mut ledger = Self::new();
        for artifact in items {
            ledger.record(artifact);
        }
        if latest.is_some() {
            ledger.latest = latest;
        }
        ledger
    }

    /// Records an artifact. Returns `true` if its id had not been seen before.
    pub fn record(&mut self, artifact: Artifact) -> bool {
        let is_new = !self.positions.contains_key(&artifact.id);
        if is_new {
            self.positions.insert(artifact.id.clone(), self.items.len());
            self.items.push(artifact.clone());
        }
        self.latest = Some(artifact);
        is_new
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
        self.latest = None;
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Artifact> {
        self.positions.get(id).map(|&idx| &self.items[idx])
    }

    pub fn items(&self) -> &[Artifact] {
        &self.items
    }

    pub fn latest(&self) -> Option<&Artifact> {
        self.latest.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
