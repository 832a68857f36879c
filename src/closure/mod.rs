//! Transitive dependency closure over entity ids.
//!
//! Given seed ids and a way to look up an entity's `depends_on` list, compute
//! every id reachable from the seeds, seeds included. The walk is an
//! iterative worklist guarded by a visited set, so it terminates on any
//! graph: cycles, self-loops and ids the lookup has never heard of (treated
//! as leaves) are all fine.
//!
//! The result is a [`BTreeSet`], so downstream hashing always sees the ids in
//! the same order regardless of how dependency lists were written.

use std::collections::{BTreeSet, HashMap};

/// Source of dependency edges for the closure walk.
pub trait DependencyLookup {
    /// Direct dependencies of `id`, or `None` when the walk should not expand it.
    ///
    /// Unknown ids return `None` and become leaves.
    fn dependencies_of(&self, id: &str) -> Option<&[String]>;
}

impl DependencyLookup for HashMap<String, Vec<String>> {
    fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.get(id).map(Vec::as_slice)
    }
}

/// Compute the transitive closure of `seeds` under `lookup`.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use metricmat::closure::resolve_closure;
///
/// let mut deps = HashMap::new();
/// deps.insert("a".to_string(), vec!["b".to_string()]);
/// deps.insert("b".to_string(), vec!["c".to_string()]);
///
/// let closure = resolve_closure(["a"], &deps);
/// assert_eq!(closure.into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
/// ```
pub fn resolve_closure<I, S>(seeds: I, lookup: &impl DependencyLookup) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut visited = BTreeSet::new();
    let mut worklist: Vec<String> = Vec::new();

    for seed in seeds {
        let seed = seed.as_ref();
        if visited.insert(seed.to_string()) {
            worklist.push(seed.to_string());
        }
    }

    while let Some(current) = worklist.pop() {
        let Some(deps) = lookup.dependencies_of(&current) else {
            continue;
        };
        for dep in deps {
            if visited.insert(dep.clone()) {
                worklist.push(dep.clone());
            }
        }
    }

    visited
}
