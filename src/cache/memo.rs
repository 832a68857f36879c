//! In-memory render memo for a single orchestration pass.
//!
//! Sits in front of the persistent store so that identical keys within one
//! pass are rendered at most once, even when the persistent cache is disabled
//! or failing. It lives for one pass and is dropped afterward.

use std::collections::HashMap;

use super::CacheKey;

/// Per-pass memo of rendered artifacts.
///
/// Hit counting lives in the pass statistics, not here.
#[derive(Debug, Default)]
pub struct RenderMemo {
    artifacts: HashMap<CacheKey, String>,
}

impl RenderMemo {
    /// Create an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the artifact memoized for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&String> {
        self.artifacts.get(key)
    }

    /// Memoize an artifact.
    pub fn insert(&mut self, key: CacheKey, artifact: String) {
        self.artifacts.insert(key, artifact);
    }
}
