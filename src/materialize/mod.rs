//! The materialization pass.
//!
//! One call to [`Orchestrator::run`] takes a [`ManifestGraph`] through every
//! stage:
//!
//! ```text
//! EXTRACT (all consumers) → PARSE (each match) → RESOLVE + HASH (each invocation)
//!   → memo / cache lookup → [hit → collect | miss → render → store → collect]
//!   → PATCH graph → done
//! ```
//!
//! Any parse or render failure aborts the whole pass with the node id and the
//! invocation text attached: a partial variable set would leave some
//! consumers without their query and the graph under-specified.
//!
//! Cache failures never abort. A broken cache degrades to rendering without
//! caching, with a warning.
//!
//! # Examples
//!
//! ```rust,no_run
//! use metricmat::graph::ManifestGraph;
//! use metricmat::materialize::Orchestrator;
//! use metricmat::render::CommandRenderer;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut graph = ManifestGraph::load(Path::new("target/manifest.json"))?;
//! let mut orchestrator = Orchestrator::new(CommandRenderer::new("mf").arg("explain-json"));
//! let outcome = orchestrator.run(&mut graph)?;
//! println!("{}", outcome.variables.to_yaml("")?);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, MaterializationCache, RenderMemo};
use crate::closure::resolve_closure;
use crate::core::{MaterializeError, Result};
use crate::extract::CallExtractor;
use crate::graph::ManifestGraph;
use crate::hashing::state_digest;
use crate::patch::{PatchMode, PatchReport, PatchRequests, patch_graph};
use crate::query::Invocation;
use crate::render::Renderer;
use crate::vars::VariableSet;

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Invocations processed
    pub invocations: usize,
    /// Served from the in-memory memo
    pub memo_hits: usize,
    /// Served from the persistent cache
    pub cache_hits: usize,
    /// Renderer calls
    pub renders: usize,
    /// Persistent cache operations that failed and were skipped
    pub cache_errors: usize,
}

impl PassStats {
    /// Share of invocations served without rendering, as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            ((self.memo_hits + self.cache_hits) as f64 / self.invocations as f64) * 100.0
        }
    }
}

/// Result of a pass.
#[derive(Debug, Clone)]
pub struct MaterializeOutcome {
    /// Signature → artifact, ready for the host tool
    pub variables: VariableSet,
    /// Every invocation found, in consumer id then source order
    pub invocations: Vec<Invocation>,
    /// Edges added to the graph
    pub patch: PatchReport,
    /// Counters
    pub stats: PassStats,
}

/// Runs materialization passes with one renderer and one cache.
pub struct Orchestrator<R> {
    extractor: CallExtractor,
    renderer: R,
    cache: Option<MaterializationCache>,
    patch_mode: PatchMode,
}

impl<R: Renderer> Orchestrator<R> {
    /// Orchestrator for the default directive, with no persistent cache and lenient patching.
    pub fn new(renderer: R) -> Self {
        Self {
            extractor: CallExtractor::default(),
            renderer,
            cache: None,
            patch_mode: PatchMode::default(),
        }
    }

    /// Scan for `directive` instead of the default name.
    #[must_use]
    pub fn with_directive(mut self, directive: &str) -> Self {
        self.extractor = CallExtractor::new(directive);
        self
    }

    /// Use `cache` as the persistent store (`None` disables it).
    #[must_use]
    pub fn with_cache(mut self, cache: Option<MaterializationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Policy for metric names that do not resolve.
    #[must_use]
    pub const fn with_patch_mode(mut self, mode: PatchMode) -> Self {
        self.patch_mode = mode;
        self
    }

    /// The renderer.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Run one pass over `graph`, patching it in place.
    ///
    /// # Errors
    ///
    /// - [`MaterializeError::Invocation`] wrapping the parse, argument, render
    ///   or (strict mode) unknown-metric failure of the first broken invocation.
    ///   The graph is untouched in that case.
    /// - [`MaterializeError::UnknownDependency`] from the patch step in strict mode.
    pub fn run(&mut self, graph: &mut ManifestGraph) -> Result<MaterializeOutcome> {
        let invocations = collect_invocations(graph, &self.extractor)?;
        debug!("Found {} invocations of {}", invocations.len(), self.extractor.directive());

        let mut memo = RenderMemo::new();
        let mut stats = PassStats::default();
        let mut variables = VariableSet::new();
        let mut requests = PatchRequests::new();

        for invocation in &invocations {
            stats.invocations += 1;
            let key = self.cache_key(graph, invocation)?;
            let artifact = self.materialize_one(invocation, key, &mut memo, &mut stats)?;

            variables.insert(&invocation.signature(), artifact);
            requests
                .entry(invocation.node_id.clone())
                .or_default()
                .extend(invocation.query.metric_names().into_iter().map(str::to_string));
        }

        let patch = patch_graph(graph, &requests, self.patch_mode)?;

        info!(
            "Materialized {} invocations ({} variables, {} rendered, {:.1}% cached), added {} edges",
            stats.invocations,
            variables.len(),
            stats.renders,
            stats.hit_rate(),
            patch.added.len()
        );

        Ok(MaterializeOutcome {
            variables,
            invocations,
            patch,
            stats,
        })
    }

    /// Resolve the invocation's closure and build its two-part key.
    fn cache_key(&self, graph: &ManifestGraph, invocation: &Invocation) -> Result<CacheKey> {
        let mut seeds = BTreeSet::new();
        for name in invocation.query.metric_names() {
            match graph.metric_id(name) {
                Some(id) => {
                    seeds.insert(id.to_string());
                }
                None if self.patch_mode == PatchMode::Strict => {
                    return Err(MaterializeError::UnknownDependency {
                        node_id: invocation.node_id.clone(),
                        name: name.to_string(),
                    }
                    .for_invocation(&invocation.node_id, &invocation.raw_text));
                }
                None => debug!("Metric '{}' not in graph, hashing without it", name),
            }
        }

        let closure = resolve_closure(&seeds, graph);
        let digest = state_digest(graph.semantic_snapshots(&closure));
        debug!(
            "{}: closure of {} entities, digest {}",
            invocation.node_id,
            closure.len(),
            digest
        );
        Ok(CacheKey::new(invocation.signature(), digest))
    }

    fn materialize_one(
        &mut self,
        invocation: &Invocation,
        key: CacheKey,
        memo: &mut RenderMemo,
        stats: &mut PassStats,
    ) -> Result<String> {
        if let Some(artifact) = memo.get(&key) {
            stats.memo_hits += 1;
            return Ok(artifact.clone());
        }

        if let Some(cache) = &self.cache {
            match cache.get(&key) {
                Ok(Some(artifact)) => {
                    debug!("Cache hit for {}", key.signature);
                    stats.cache_hits += 1;
                    memo.insert(key, artifact.clone());
                    return Ok(artifact);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Cache lookup failed, rendering without cache: {}", e);
                    stats.cache_errors += 1;
                }
            }
        }

        debug!("Rendering {} for {}", key.signature, invocation.node_id);
        let artifact = self
            .renderer
            .render(&invocation.query)
            .map_err(|e| e.for_invocation(&invocation.node_id, &invocation.raw_text))?;
        stats.renders += 1;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put(&key, &artifact)
        {
            warn!("Cache store failed, continuing without caching: {}", e);
            stats.cache_errors += 1;
        }

        memo.insert(key, artifact.clone());
        Ok(artifact)
    }
}

/// Extract and parse every invocation in the graph's consumer nodes.
///
/// Consumers are visited in id order, matches in source order.
///
/// # Errors
///
/// The first parse failure, wrapped in [`MaterializeError::Invocation`].
pub fn collect_invocations(graph: &ManifestGraph, extractor: &CallExtractor) -> Result<Vec<Invocation>> {
    let mut invocations = Vec::new();
    for consumer in graph.consumers() {
        let Some(code) = consumer.raw_code.as_deref() else {
            continue;
        };
        invocations.extend(parse_invocations(&consumer.id, code, extractor)?);
    }
    Ok(invocations)
}

/// Extract and parse the invocations in one source text.
///
/// # Errors
///
/// The first parse failure, wrapped in [`MaterializeError::Invocation`].
pub fn parse_invocations(node_id: &str, text: &str, extractor: &CallExtractor) -> Result<Vec<Invocation>> {
    extractor
        .extract(text)
        .map(|found| {
            Invocation::parse(node_id, found.as_str()).map_err(|e| e.for_invocation(node_id, found.as_str()))
        })
        .collect()
}
