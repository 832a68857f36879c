//! Graph patching: record what each consumer materialized.
//!
//! A consumer node that invokes the directive depends on the metrics it
//! names, but the pipeline only learns this once the invocation has been
//! parsed. The patcher appends the resolved metric ids to each consumer's
//! `depends_on` list so the pipeline schedules the consumer after them.
//!
//! Edges only ever go from a consumer to a producer, existing edges are kept,
//! and an edge already present is never added twice, so re-running a pass on
//! unchanged sources produces the same graph.
//!
//! # Unknown Names
//!
//! A metric name with no matching entity is handled according to
//! [`PatchMode`]: `Lenient` logs a warning and drops it, `Strict` fails the
//! patch with [`MaterializeError::UnknownDependency`] before touching the
//! graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::core::{MaterializeError, Result};
use crate::graph::ManifestGraph;

/// Policy for producer names that do not resolve to an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Warn and skip the name
    #[default]
    Lenient,
    /// Fail the patch
    Strict,
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => f.write_str("lenient"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for PatchMode {
    type Err = MaterializeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(MaterializeError::Config {
                message: format!("unknown patch mode '{other}' (expected 'lenient' or 'strict')"),
            }),
        }
    }
}

/// Consumer id → metric names it invoked.
pub type PatchRequests = BTreeMap<String, BTreeSet<String>>;

/// What a patch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// `(consumer id, producer id)` edges newly added
    pub added: Vec<(String, String)>,
    /// `(consumer id, producer name)` pairs that did not resolve
    pub unknown: Vec<(String, String)>,
}

impl PatchReport {
    /// Whether the graph was left unchanged.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// Add consumer → metric edges to `graph`.
///
/// # Errors
///
/// - [`MaterializeError::UnknownDependency`] in strict mode when a name does
///   not resolve; the graph is not modified.
/// - [`MaterializeError::EntityNotFound`] when a requesting id is not a
///   consumer node of `graph`.
pub fn patch_graph(
    graph: &mut ManifestGraph,
    requests: &PatchRequests,
    mode: PatchMode,
) -> Result<PatchReport> {
    let mut report = PatchReport::default();
    let mut resolved: Vec<(&str, Vec<String>)> = Vec::with_capacity(requests.len());

    for (node_id, names) in requests {
        let mut ids = Vec::new();
        for name in names {
            match graph.metric_id(name) {
                Some(id) => ids.push(id.to_string()),
                None if mode == PatchMode::Strict => {
                    return Err(MaterializeError::UnknownDependency {
                        node_id: node_id.clone(),
                        name: name.clone(),
                    });
                }
                None => {
                    warn!("Node '{}' references unknown metric '{}'; no edge added", node_id, name);
                    report.unknown.push((node_id.clone(), name.clone()));
                }
            }
        }
        resolved.push((node_id, ids));
    }

    for (node_id, ids) in resolved {
        let before: BTreeSet<String> = graph.require(node_id)?.depends_on.iter().cloned().collect();
        graph.add_dependencies(node_id, &ids)?;
        for id in ids {
            if !before.contains(&id) {
                debug!("Added dependency {} -> {}", node_id, id);
                report.added.push((node_id.to_string(), id));
            }
        }
    }

    Ok(report)
}
