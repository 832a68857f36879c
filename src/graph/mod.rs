//! In-memory graph provider for a materialization pass.
//!
//! The graph holds every [`Entity`] of the transformation pipeline: metrics,
//! semantic sources and the pipeline's own nodes. It is built once by a loader
//! (see [`manifest_io`]) and then only read, except for the `depends_on` lists
//! of consumer nodes, which the patcher extends.
//!
//! # Entity Kinds
//!
//! | Kind                          | Manifest section   | Expanded by closure |
//! |-------------------------------|--------------------|---------------------|
//! | [`EntityKind::Metric`]        | `metrics`          | yes                 |
//! | [`EntityKind::SemanticSource`]| `semantic_models`  | yes                 |
//! | [`EntityKind::Other`]         | `nodes`            | no (leaf)           |
//!
//! Consumers are `Other` entities whose id starts with `model.`.

pub mod manifest_io;
pub mod order;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::closure::DependencyLookup;
use crate::constants::CONSUMER_ID_PREFIX;
use crate::core::{MaterializeError, Result};

/// Kind of an entity in the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// A metric definition
    Metric,
    /// A semantic model the metrics are defined over
    SemanticSource,
    /// Any other pipeline node (models, seeds, sources, ...)
    Other,
}

impl EntityKind {
    /// Whether closure traversal expands entities of this kind.
    #[must_use]
    pub const fn is_semantic(self) -> bool {
        matches!(self, Self::Metric | Self::SemanticSource)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metric => "metric",
            Self::SemanticSource => "semantic model",
            Self::Other => "node",
        };
        f.write_str(name)
    }
}

/// One node of the external dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Globally unique id (`metric.shop.revenue`)
    pub id: String,
    /// Human name, unique within its kind
    pub name: String,
    /// What this entity is
    pub kind: EntityKind,
    /// Ids this entity depends on, in manifest order
    pub depends_on: Vec<String>,
    /// Source text scanned for directives (consumers only)
    pub raw_code: Option<String>,
    /// Attribute mapping used for hashing, volatile fields removed
    pub snapshot: Value,
}

impl Entity {
    /// Create an entity with no dependencies, source text or snapshot.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            raw_code: None,
            snapshot: Value::Null,
        }
    }

    /// Set the dependency list.
    #[must_use]
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source text.
    #[must_use]
    pub fn with_raw_code(mut self, code: impl Into<String>) -> Self {
        self.raw_code = Some(code.into());
        self
    }

    /// Set the hashing snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Value) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Whether the patcher may add edges to this entity.
    #[must_use]
    pub fn is_consumer(&self) -> bool {
        self.kind == EntityKind::Other && self.id.starts_with(CONSUMER_ID_PREFIX)
    }
}

/// The pipeline graph: entities by id plus a name index per kind.
#[derive(Debug, Clone, Default)]
pub struct ManifestGraph {
    entities: BTreeMap<String, Entity>,
    names: HashMap<(EntityKind, String), String>,
    /// Manifest document the graph was loaded from, kept for write-back
    document: Option<Value>,
}

impl ManifestGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity.
    pub fn insert(&mut self, entity: Entity) {
        self.names.insert((entity.kind, entity.name.clone()), entity.id.clone());
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Look up an entity by id, failing with [`MaterializeError::EntityNotFound`].
    pub fn require(&self, id: &str) -> Result<&Entity> {
        self.get(id).ok_or_else(|| MaterializeError::EntityNotFound { id: id.to_string() })
    }

    /// Resolve a name to an id within one kind.
    #[must_use]
    pub fn id_for_name(&self, kind: EntityKind, name: &str) -> Option<&str> {
        self.names.get(&(kind, name.to_string())).map(String::as_str)
    }

    /// Resolve a metric name to its id.
    #[must_use]
    pub fn metric_id(&self, name: &str) -> Option<&str> {
        self.id_for_name(EntityKind::Metric, name)
    }

    /// All entities, sorted by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Consumer nodes, sorted by id.
    pub fn consumers(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_consumer())
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the graph has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshots of the semantic entities among `ids`, in the iteration order of `ids`.
    ///
    /// Ids that are unknown or belong to [`EntityKind::Other`] are skipped.
    pub fn semantic_snapshots<'i, I>(&self, ids: I) -> Vec<&Value>
    where
        I: IntoIterator<Item = &'i String>,
    {
        ids.into_iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.kind.is_semantic())
            .map(|e| &e.snapshot)
            .collect()
    }

    /// Append `deps` to a consumer's `depends_on`, skipping ids already present.
    ///
    /// Returns the number of edges actually added.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::EntityNotFound`] if `node_id` is unknown or is not a
    /// consumer; producers never gain edges.
    pub fn add_dependencies(&mut self, node_id: &str, deps: &[String]) -> Result<usize> {
        let entity = self
            .entities
            .get_mut(node_id)
            .filter(|e| e.is_consumer())
            .ok_or_else(|| MaterializeError::EntityNotFound { id: node_id.to_string() })?;

        let mut added = 0;
        for dep in deps {
            if !entity.depends_on.contains(dep) {
                entity.depends_on.push(dep.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    pub(crate) fn set_document(&mut self, document: Value) {
        self.document = Some(document);
    }

    pub(crate) fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }
}

/// Closure traversal expands metrics and semantic sources only.
impl DependencyLookup for ManifestGraph {
    fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.entities.get(id).filter(|e| e.kind.is_semantic()).map(|e| e.depends_on.as_slice())
    }
}
