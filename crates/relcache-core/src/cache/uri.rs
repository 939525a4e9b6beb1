//! URI-based backend construction.

use super::memory::MemoryCache;
use super::traits::Cache;
use crate::config::{SchemeConfig, StoreConfigFile};
use crate::error::{CacheError, Result};
use crate::relational::{RelationalCache, RelationalEngine, RelationalStore, SingleTable};
use std::collections::BTreeMap;
use tracing::debug;

/// Builds a backend from the part of a URI after `scheme://`.
pub type BackendConstructor =
    Box<dyn Fn(&str, &StoreConfigFile) -> Result<Box<dyn Cache>> + Send + Sync>;

/// Scheme to backend constructor table.
///
/// Built explicitly by the application; nothing registers itself.
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Split `scheme://remainder`.
pub(crate) fn split_uri(uri: &str) -> Result<(&str, &str)> {
    match uri.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => Ok((scheme, rest)),
        _ => Err(CacheError::InvalidUri {
            uri: uri.to_string(),
        }),
    }
}

/// Build a relational cache over `engine` following a config file.
fn relational(engine: RelationalEngine, config: &StoreConfigFile) -> Result<Box<dyn Cache>> {
    if let Some(single) = &config.single_table {
        let layout = single.clone().into_config()?;
        return Ok(Box::new(RelationalStore::<SingleTable>::create(engine, layout)?));
    }
    let scopes = config
        .scopes
        .iter()
        .cloned()
        .map(|spec| spec.into_config())
        .collect::<Result<Vec<_>>>()?;
    let cache = RelationalCache::builder()
        .options(config.options.clone())
        .scopes(scopes)
        .build(engine)?;
    Ok(Box::new(cache))
}

impl BackendRegistry {
    /// Registry without any scheme.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every backend compiled into this build.
    ///
    /// `sqlite://PATH` (`sqlite:///abs/path.db`, `sqlite://:memory:`) and
    /// `memory://`, plus `postgresql://`/`postgres://` and `mysql://` when
    /// their features are enabled. Network URIs go to the driver whole.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SchemeConfig::SQLITE, |path, config| {
            let engine = RelationalEngine::open_sqlite(path, &config.options)?;
            relational(engine, config)
        });
        registry.register(SchemeConfig::MEMORY, |_, _| Ok(Box::new(MemoryCache::new())));

        #[cfg(feature = "postgres")]
        for scheme in [SchemeConfig::POSTGRES, SchemeConfig::POSTGRESQL] {
            registry.register(scheme, move |rest, config| {
                let engine =
                    RelationalEngine::connect_postgres(&format!("{}://{}", scheme, rest))?;
                relational(engine, config)
            });
        }

        #[cfg(feature = "mysql")]
        registry.register(SchemeConfig::MYSQL, |rest, config| {
            let engine =
                RelationalEngine::connect_mysql(&format!("{}://{}", SchemeConfig::MYSQL, rest))?;
            relational(engine, config)
        });

        registry
    }

    /// Add or replace the constructor of a scheme.
    pub fn register<F>(&mut self, scheme: &str, constructor: F)
    where
        F: Fn(&str, &StoreConfigFile) -> Result<Box<dyn Cache>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(scheme.to_lowercase(), Box::new(constructor));
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Open a backend with default configuration.
    pub fn open(&self, uri: &str) -> Result<Box<dyn Cache>> {
        self.open_with(uri, &StoreConfigFile::default())
    }

    /// Open a backend; relational backends follow `config`.
    pub fn open_with(&self, uri: &str, config: &StoreConfigFile) -> Result<Box<dyn Cache>> {
        let (scheme, rest) = split_uri(uri)?;
        let constructor = self
            .constructors
            .get(&scheme.to_lowercase())
            .ok_or_else(|| CacheError::UnknownScheme {
                scheme: scheme.to_string(),
            })?;
        debug!("Opening {} backend", scheme);
        constructor(rest, config)
    }
}
