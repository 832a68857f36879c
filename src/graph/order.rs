//! Execution order and cycle detection.
//!
//! Patching only adds consumer → metric edges, which cannot close a cycle in
//! an acyclic manifest. The pass still verifies the patched graph before it
//! is handed back, because a cycle here would make the pipeline refuse to run
//! and is much easier to explain with the path at hand.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::ManifestGraph;
use crate::core::{MaterializeError, Result};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed view of a [`ManifestGraph`]: an edge `a → b` means `a` depends on `b`.
struct DependencyView<'g> {
    graph: DiGraph<&'g str, ()>,
}

impl<'g> DependencyView<'g> {
    fn build(manifest: &'g ManifestGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&'g str, NodeIndex> = HashMap::new();

        let mut ensure = |graph: &mut DiGraph<&'g str, ()>, id: &'g str| {
            *index.entry(id).or_insert_with(|| graph.add_node(id))
        };

        for entity in manifest.entities() {
            let from = ensure(&mut graph, entity.id.as_str());
            for dep in &entity.depends_on {
                let to = ensure(&mut graph, dep.as_str());
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph }
    }

    fn find_cycle(&self) -> Option<Vec<&'g str>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.visit(node, &mut colors, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<&'g str>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].iter().map(|n| self.graph[*n]).collect();
                    cycle.push(self.graph[neighbor]);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }
}

impl ManifestGraph {
    /// Entity ids in execution order: every id comes after everything it depends on.
    ///
    /// Ids referenced in `depends_on` but absent from the graph are included.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::CycleDetected`] with the cycle rendered as
    /// `a → b → a`.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        let view = DependencyView::build(self);

        if let Some(cycle) = view.find_cycle() {
            return Err(MaterializeError::CycleDetected {
                path: cycle.join(" → "),
            });
        }

        match toposort(&view.graph, None) {
            Ok(indices) => Ok(indices.into_iter().rev().map(|idx| view.graph[idx].to_string()).collect()),
            Err(cycle) => Err(MaterializeError::CycleDetected {
                path: view.graph[cycle.node_id()].to_string(),
            }),
        }
    }
}
