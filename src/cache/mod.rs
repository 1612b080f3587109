//! Optional compiled-SQL cache.
//!
//! Entries are keyed by a fingerprint of (schema version, normalized query)
//! so a schema reload - which changes the version hash - never serves stale
//! SQL, and the cache can additionally be flushed wholesale on reload.
//! Backed by a concurrent map: compilation runs in parallel across dashboard
//! tabs and the cache must not serialize those callers.

pub mod hash;

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::compiler::CompiledQuery;

/// Concurrent cache of compiled queries.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: DashMap<String, Arc<CompiledQuery>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint for a (schema version, query) pair.
    ///
    /// The query is normalized through a canonical JSON value, so two
    /// requests differing only in field order share an entry. Returns None
    /// when the query cannot be serialized; such queries are simply not
    /// cached.
    pub fn fingerprint<Q: Serialize>(schema_version: &str, query: &Q) -> Option<String> {
        hash::compute_canonical_hash(&(schema_version, query)).ok()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CompiledQuery>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    pub fn insert(&self, key: String, compiled: CompiledQuery) -> Arc<CompiledQuery> {
        let arc = Arc::new(compiled);
        self.entries.insert(key, Arc::clone(&arc));
        arc
    }

    /// Drop every entry. Called on schema reload.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
