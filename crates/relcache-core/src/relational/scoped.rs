//! One table per scope.
//!
//! A scope registers once and stays registered for the life of the cache:
//! - explicit configs are registered and their tables created at build time;
//! - existing tables not claimed by a config are discovered and registered
//!   under their own name;
//! - an unseen scope is passed to the scope factory, if one is set.

use super::engine::RelationalEngine;
use super::store::{Addressing, RelationalStore};
use super::table::TableConfig;
use crate::config::StoreOptions;
use crate::error::{CacheError, Result};
use crate::value::{Key, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Produces the config of an unseen scope.
pub type ScopeFactory = Box<dyn FnMut(&str) -> Result<TableConfig> + Send>;

/// Scope to table bookkeeping.
pub struct ScopeRegistry {
    scopes: IndexMap<String, Arc<TableConfig>>,
    /// table name -> scope name
    tables: HashMap<String, String>,
    factory: Option<ScopeFactory>,
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Cache with one table per scope.
pub type RelationalCache = RelationalStore<ScopeRegistry>;

impl ScopeRegistry {
    fn new(factory: Option<ScopeFactory>) -> Self {
        Self {
            scopes: IndexMap::new(),
            tables: HashMap::new(),
            factory,
        }
    }

    /// Config of a registered scope.
    pub fn get(&self, scope: &str) -> Option<&TableConfig> {
        self.scopes.get(scope).map(Arc::as_ref)
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Registered scope names, in registration order.
    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    fn check_new(&self, config: &TableConfig) -> Result<()> {
        if self.scopes.contains_key(config.scope()) {
            return Err(CacheError::DuplicateScope {
                scope: config.scope().to_string(),
            });
        }
        if self.tables.contains_key(config.table()) {
            return Err(CacheError::DuplicateTable {
                table: config.table().to_string(),
            });
        }
        Ok(())
    }

    fn register(&mut self, config: TableConfig) -> Result<Arc<TableConfig>> {
        self.check_new(&config)?;
        let config = Arc::new(config);
        self.tables
            .insert(config.table().to_string(), config.scope().to_string());
        self.scopes
            .insert(config.scope().to_string(), Arc::clone(&config));
        Ok(config)
    }

    /// Register every table not yet bound to a scope or claimed by a config.
    fn discover(&mut self, engine: &mut RelationalEngine) -> Result<()> {
        for table in engine.list_tables()? {
            if self.tables.contains_key(&table) || self.scopes.contains_key(&table) {
                continue;
            }
            let unique = engine.list_unique_columns(&table)?;
            if unique.is_empty() {
                warn!("Skipping table {} without a primary key", table);
                continue;
            }
            let columns: Vec<String> = engine
                .list_columns(&table)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let config = TableConfig::new(table.as_str(), unique, columns)?;
            info!(
                "Discovered scope {} ({} unique, {} data columns)",
                table,
                config.unique_columns().len(),
                config.data_columns().len()
            );
            self.register(config)?;
        }
        Ok(())
    }

    fn lookup(&mut self, engine: &mut RelationalEngine, scope: &str) -> Result<Arc<TableConfig>> {
        if let Some(config) = self.scopes.get(scope) {
            return Ok(Arc::clone(config));
        }

        let factory = self
            .factory
            .as_mut()
            .ok_or_else(|| CacheError::ScopeNotAllowed {
                scope: scope.to_string(),
            })?;
        let config = factory(scope)?;
        if config.scope() != scope {
            return Err(CacheError::ScopeConflict {
                requested: scope.to_string(),
                configured: config.scope().to_string(),
            });
        }
        self.check_new(&config)?;
        engine.create_tables(&[&config])?;
        info!("Registered new scope {} (table {})", scope, config.table());
        self.register(config)
    }
}

fn scope_name(scope: Option<&Key>) -> Result<String> {
    let scope = scope.ok_or(CacheError::MissingArgument("scope"))?;
    if *scope == Key::Single(Value::Null) {
        return Err(CacheError::MissingArgument("scope"));
    }
    scope
        .as_name()
        .ok_or_else(|| CacheError::invalid_value(format!("scope must be a name, got {}", scope)))
}

impl Addressing for ScopeRegistry {
    fn resolve(
        &mut self,
        engine: &mut RelationalEngine,
        key: &Key,
        scope: Option<&Key>,
    ) -> Result<(Arc<TableConfig>, Vec<Value>)> {
        let scope = scope_name(scope)?;
        let config = self.lookup(engine, &scope)?;
        let key = key.to_tuple(config.unique_columns().len(), "key")?;
        Ok((config, key))
    }

    fn scopes(&mut self, _engine: &mut RelationalEngine) -> Result<Vec<Key>> {
        Ok(self.scopes.keys().map(|s| Key::from(s.as_str())).collect())
    }

    fn keys(&mut self, engine: &mut RelationalEngine, scope: Option<&Key>) -> Result<Vec<Key>> {
        let scope = scope_name(scope)?;
        let config = self.lookup(engine, &scope)?;
        let rows = engine.select_rows(&config, None, config.unique_columns(), false)?;
        Ok(rows.into_iter().map(Key::from_tuple).collect())
    }

    fn clear_scope(&mut self, engine: &mut RelationalEngine, scope: &Key) -> Result<()> {
        let scope = scope_name(Some(scope))?;
        let config = self.lookup(engine, &scope)?;
        engine.delete_rows(None, &config)
    }
}

/// Builder for [`RelationalCache`].
pub struct RelationalCacheBuilder {
    configs: Vec<TableConfig>,
    factory: Option<ScopeFactory>,
    options: StoreOptions,
}

impl Default for RelationalCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationalCacheBuilder {
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
            factory: None,
            options: StoreOptions::default(),
        }
    }

    /// Store options. `allow_new_scopes` installs a factory for
    /// default `id`/`data` tables unless one is set explicitly.
    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a scope and create its table at build time.
    pub fn scope(mut self, config: TableConfig) -> Self {
        self.configs.push(config);
        self
    }

    pub fn scopes(mut self, configs: impl IntoIterator<Item = TableConfig>) -> Self {
        self.configs.extend(configs);
        self
    }

    /// Callback creating the config of an unseen scope.
    ///
    /// Default: none, unseen scopes are rejected
    pub fn scope_factory<F>(mut self, factory: F) -> Self
    where
        F: FnMut(&str) -> Result<TableConfig> + Send + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Register existing tables as scopes.
    ///
    /// Default: true
    pub fn discover_tables(mut self, enabled: bool) -> Self {
        self.options.discover_tables = enabled;
        self
    }

    /// Register everything on an engine.
    ///
    /// Duplicate scopes or tables fail before any SQL runs.
    pub fn build(self, mut engine: RelationalEngine) -> Result<RelationalCache> {
        let factory = match self.factory {
            Some(factory) => Some(factory),
            None if self.options.allow_new_scopes => {
                Some(Box::new(|scope: &str| TableConfig::builder(scope).build()) as ScopeFactory)
            }
            None => None,
        };

        let mut registry = ScopeRegistry::new(factory);
        for config in self.configs {
            registry.register(config)?;
        }

        let configs: Vec<&TableConfig> = registry.scopes.values().map(Arc::as_ref).collect();
        engine.create_tables(&configs)?;
        for config in &configs {
            info!("Registered scope {} (table {})", config.scope(), config.table());
        }

        if self.options.discover_tables {
            registry.discover(&mut engine)?;
        }

        Ok(RelationalStore::from_parts(engine, registry))
    }

    /// Open a SQLite database with the builder's options and build on it.
    pub fn open_sqlite(self, path: impl AsRef<Path>) -> Result<RelationalCache> {
        let engine = RelationalEngine::open_sqlite(path, &self.options)?;
        self.build(engine)
    }
}

impl RelationalStore<ScopeRegistry> {
    pub fn builder() -> RelationalCacheBuilder {
        RelationalCacheBuilder::new()
    }

    /// Open a SQLite database, discovering its tables as scopes.
    pub fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().open_sqlite(path)
    }

    /// Registered scope names without touching the database.
    pub fn registered_scopes(&self) -> Vec<&str> {
        self.addressing().scope_names().collect()
    }
}
