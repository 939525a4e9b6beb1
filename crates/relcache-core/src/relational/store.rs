//! The relational cache front-end.
//!
//! [`RelationalStore`] implements [`Cache`] once over [`RelationalEngine`].
//! How a `(key, scope)` pair becomes a table and a unique-column tuple is
//! left to an [`Addressing`] strategy: one table per scope
//! ([`ScopeRegistry`](super::ScopeRegistry)) or one shared table
//! ([`SingleTable`](super::SingleTable)).

use super::engine::RelationalEngine;
use super::table::TableConfig;
use crate::cache::Cache;
use crate::error::Result;
use crate::value::{CacheValue, Key, Value};
use std::sync::Arc;

/// Maps cache addresses onto tables and rows.
pub trait Addressing: Send {
    /// Table and unique-column tuple of one cache entry.
    fn resolve(
        &mut self,
        engine: &mut RelationalEngine,
        key: &Key,
        scope: Option<&Key>,
    ) -> Result<(Arc<TableConfig>, Vec<Value>)>;

    fn scopes(&mut self, engine: &mut RelationalEngine) -> Result<Vec<Key>>;

    fn keys(&mut self, engine: &mut RelationalEngine, scope: Option<&Key>) -> Result<Vec<Key>>;

    /// Delete every entry of a scope.
    fn clear_scope(&mut self, engine: &mut RelationalEngine, scope: &Key) -> Result<()>;
}

/// A [`Cache`] over a relational database.
#[derive(Debug)]
pub struct RelationalStore<A> {
    engine: RelationalEngine,
    addressing: A,
}

impl<A: Addressing> RelationalStore<A> {
    pub fn from_parts(engine: RelationalEngine, addressing: A) -> Self {
        Self { engine, addressing }
    }

    pub fn engine(&self) -> &RelationalEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RelationalEngine {
        &mut self.engine
    }

    pub fn addressing(&self) -> &A {
        &self.addressing
    }

    /// Delete every entry of a scope. The scope itself stays registered.
    pub fn clear_scope(&mut self, scope: &Key) -> Result<()> {
        self.addressing.clear_scope(&mut self.engine, scope)
    }

    /// Release the connection.
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }
}

impl<A: Addressing> Cache for RelationalStore<A> {
    fn backend(&self) -> &'static str {
        self.engine.backend()
    }

    fn exists(&mut self, key: &Key, scope: Option<&Key>) -> Result<bool> {
        let (config, key) = self.addressing.resolve(&mut self.engine, key, scope)?;
        self.engine.exists_row(&key, &config)
    }

    fn fetch(&mut self, key: &Key, scope: Option<&Key>) -> Result<Option<CacheValue>> {
        let (config, key) = self.addressing.resolve(&mut self.engine, key, scope)?;
        self.engine.fetch_row(&key, &config)
    }

    fn set(&mut self, key: &Key, value: &CacheValue, scope: Option<&Key>) -> Result<bool> {
        let (config, key) = self.addressing.resolve(&mut self.engine, key, scope)?;
        self.engine.set_row(&key, value, &config)?;
        Ok(true)
    }

    fn pop(&mut self, key: &Key, scope: Option<&Key>) -> Result<()> {
        let (config, key) = self.addressing.resolve(&mut self.engine, key, scope)?;
        self.engine.delete_row(&key, &config)
    }

    fn scopes(&mut self) -> Result<Vec<Key>> {
        self.addressing.scopes(&mut self.engine)
    }

    fn keys(&mut self, scope: Option<&Key>) -> Result<Vec<Key>> {
        self.addressing.keys(&mut self.engine, scope)
    }
}
