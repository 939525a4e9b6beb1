//! One table shared by every scope.
//!
//! The leading unique columns hold the scope and the trailing ones hold the
//! key, so a cache entry's unique tuple is `scope ++ key`.

use super::engine::RelationalEngine;
use super::store::{Addressing, RelationalStore};
use super::table::{SingleTableConfig, TableConfig};
use crate::config::StoreOptions;
use crate::error::{CacheError, Result};
use crate::value::{Key, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Addressing over a [`SingleTableConfig`].
#[derive(Debug)]
pub struct SingleTable {
    layout: SingleTableConfig,
    config: Arc<TableConfig>,
}

/// Cache with every scope in one table.
pub type SingleTableCache = RelationalStore<SingleTable>;

impl SingleTable {
    pub fn new(layout: SingleTableConfig) -> Self {
        let config = Arc::new(layout.table_config().clone());
        Self { layout, config }
    }

    pub fn layout(&self) -> &SingleTableConfig {
        &self.layout
    }

    fn scope_tuple(&self, scope: Option<&Key>) -> Result<Vec<Value>> {
        let scope = scope.ok_or(CacheError::MissingArgument("scope"))?;
        scope.to_tuple(self.layout.scope_columns().len(), "scope")
    }
}

impl Addressing for SingleTable {
    fn resolve(
        &mut self,
        _engine: &mut RelationalEngine,
        key: &Key,
        scope: Option<&Key>,
    ) -> Result<(Arc<TableConfig>, Vec<Value>)> {
        let mut tuple = self.scope_tuple(scope)?;
        tuple.extend(key.to_tuple(self.layout.key_columns().len(), "key")?);
        Ok((Arc::clone(&self.config), tuple))
    }

    fn scopes(&mut self, engine: &mut RelationalEngine) -> Result<Vec<Key>> {
        let rows = engine.select_rows(&self.config, None, self.layout.scope_columns(), true)?;
        Ok(rows.into_iter().map(Key::from_tuple).collect())
    }

    fn keys(&mut self, engine: &mut RelationalEngine, scope: Option<&Key>) -> Result<Vec<Key>> {
        let scope = self.scope_tuple(scope)?;
        let rows = engine.select_rows(
            &self.config,
            Some(&scope),
            self.layout.key_columns(),
            false,
        )?;
        Ok(rows.into_iter().map(Key::from_tuple).collect())
    }

    fn clear_scope(&mut self, engine: &mut RelationalEngine, scope: &Key) -> Result<()> {
        let scope = self.scope_tuple(Some(scope))?;
        engine.delete_rows(Some(&scope), &self.config)
    }
}

impl RelationalStore<SingleTable> {
    /// Create the shared table if needed and build the cache on `engine`.
    pub fn create(mut engine: RelationalEngine, layout: SingleTableConfig) -> Result<Self> {
        engine.create_tables(&[layout.table_config()])?;
        info!(
            "Using shared table {} ({} scope columns)",
            layout.table_config().table(),
            layout.scope_columns().len()
        );
        Ok(RelationalStore::from_parts(engine, SingleTable::new(layout)))
    }

    /// Open a SQLite database holding the shared table.
    pub fn open_sqlite(
        path: impl AsRef<Path>,
        layout: SingleTableConfig,
        options: &StoreOptions,
    ) -> Result<Self> {
        let engine = RelationalEngine::open_sqlite(path, options)?;
        Self::create(engine, layout)
    }
}
