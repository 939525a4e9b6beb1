//! In-memory cache.

use super::traits::Cache;
use crate::error::Result;
use crate::value::{CacheValue, Key, Value};
use indexmap::IndexMap;

#[derive(Debug)]
struct ScopeEntries {
    scope: Key,
    entries: IndexMap<String, (Key, CacheValue)>,
}

/// Process-local map cache.
///
/// Keys are indexed by their display form, so `Key::from(1)` and
/// `Key::from("1")` stay distinct. A `None` scope is its own namespace.
#[derive(Debug, Default)]
pub struct MemoryCache {
    scopes: IndexMap<String, ScopeEntries>,
}

fn scope_key(scope: Option<&Key>) -> Key {
    scope.cloned().unwrap_or(Key::Single(Value::Null))
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across every scope.
    pub fn len(&self) -> usize {
        self.scopes.values().map(|s| s.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self, scope: Option<&Key>) -> Option<&IndexMap<String, (Key, CacheValue)>> {
        self.scopes
            .get(&scope_key(scope).to_string())
            .map(|s| &s.entries)
    }
}

impl Cache for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn exists(&mut self, key: &Key, scope: Option<&Key>) -> Result<bool> {
        Ok(self
            .entries(scope)
            .is_some_and(|entries| entries.contains_key(&key.to_string())))
    }

    fn fetch(&mut self, key: &Key, scope: Option<&Key>) -> Result<Option<CacheValue>> {
        Ok(self
            .entries(scope)
            .and_then(|entries| entries.get(&key.to_string()))
            .map(|(_, value)| value.clone()))
    }

    fn set(&mut self, key: &Key, value: &CacheValue, scope: Option<&Key>) -> Result<bool> {
        let scope = scope_key(scope);
        self.scopes
            .entry(scope.to_string())
            .or_insert_with(|| ScopeEntries {
                scope,
                entries: IndexMap::new(),
            })
            .entries
            .insert(key.to_string(), (key.clone(), value.clone()));
        Ok(true)
    }

    /// Returns the value that was replaced.
    fn update(
        &mut self,
        key: &Key,
        value: &CacheValue,
        scope: Option<&Key>,
    ) -> Result<Option<CacheValue>> {
        let previous = self.fetch(key, scope)?;
        self.set(key, value, scope)?;
        Ok(previous)
    }

    fn pop(&mut self, key: &Key, scope: Option<&Key>) -> Result<()> {
        if let Some(s) = self.scopes.get_mut(&scope_key(scope).to_string()) {
            s.entries.shift_remove(&key.to_string());
        }
        Ok(())
    }

    fn scopes(&mut self) -> Result<Vec<Key>> {
        Ok(self.scopes.values().map(|s| s.scope.clone()).collect())
    }

    fn keys(&mut self, scope: Option<&Key>) -> Result<Vec<Key>> {
        Ok(self
            .entries(scope)
            .map(|entries| entries.values().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default())
    }
}
