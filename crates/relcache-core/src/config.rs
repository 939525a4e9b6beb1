//! Centralized configuration for relcache.
//!
//! Constant holders for tunables plus the serde-loadable store configuration
//! consumed by the CLI and by applications that keep their scope layout in a
//! JSON file.

use crate::error::{CacheError, Result};
use crate::relational::{SingleTableConfig, TableSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// SQLite connection settings.
pub struct SqliteConfig;

impl SqliteConfig {
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MEMORY_PATH: &'static str = ":memory:";
    pub const DEFAULT_COLUMN_TYPE: &'static str = "text";
}

/// Engine-wide settings shared by every dialect.
pub struct EngineConfig;

impl EngineConfig {
    /// Default unique column of a table spec that names none.
    pub const DEFAULT_UNIQUE_COLUMN: &'static str = "id";
    /// Default data column of a table spec that names none.
    pub const DEFAULT_DATA_COLUMN: &'static str = "data";
    pub const POSTGRES_DEFAULT_COLUMN_TYPE: &'static str = "text";
    pub const MYSQL_DEFAULT_COLUMN_TYPE: &'static str = "text";
    /// MySQL cannot index an unbounded text column.
    pub const MYSQL_DEFAULT_KEY_COLUMN_TYPE: &'static str = "varchar(255)";
}

/// URI schemes understood by the default backend registry.
pub struct SchemeConfig;

impl SchemeConfig {
    pub const SQLITE: &'static str = "sqlite";
    pub const MEMORY: &'static str = "memory";
    pub const POSTGRES: &'static str = "postgres";
    pub const POSTGRESQL: &'static str = "postgresql";
    pub const MYSQL: &'static str = "mysql";
}

/// Options applied when opening a relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StoreOptions {
    /// Register every existing table as a scope at construction.
    pub discover_tables: bool,
    /// Create an `id`/`data` table for an unseen scope instead of failing.
    pub allow_new_scopes: bool,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Switch SQLite databases to WAL journaling.
    pub wal: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            discover_tables: true,
            allow_new_scopes: false,
            busy_timeout_ms: SqliteConfig::BUSY_TIMEOUT.as_millis() as u64,
            wal: true,
        }
    }
}

impl StoreOptions {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Single-table layout as stored in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTableSpec {
    pub table: TableSpec,
    /// Number of leading unique columns that hold the scope.
    pub scope_columns: usize,
}

impl SingleTableSpec {
    pub fn into_config(self) -> Result<SingleTableConfig> {
        SingleTableConfig::new(self.table.into_config()?, self.scope_columns)
    }
}

/// Store configuration file.
///
/// ```json
/// {
///   "options": { "discover_tables": true },
///   "scopes": [
///     { "scope": "a", "unique_columns": ["id"], "data_columns": ["id", "name"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfigFile {
    pub options: StoreOptions,
    pub scopes: Vec<TableSpec>,
    pub single_table: Option<SingleTableSpec>,
}

impl StoreConfigFile {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| CacheError::io_with_path(e, path))?;
        serde_json::from_str(&contents).map_err(|e| CacheError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = StoreOptions::default();
        assert!(options.discover_tables);
        assert!(!options.allow_new_scopes);
        assert!(options.wal);
        assert_eq!(options.busy_timeout(), SqliteConfig::BUSY_TIMEOUT);
    }

    #[test]
    fn test_load_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{
                "options": { "discover_tables": false },
                "scopes": [
                    { "scope": "a", "unique_columns": ["id"],
                      "data_columns": ["id", "name", "count"],
                      "column_types": { "count": "int" } }
                ]
            }"#,
        )
        .unwrap();

        let file = StoreConfigFile::load(&path).unwrap();
        assert!(!file.options.discover_tables);
        assert!(file.options.wal);
        assert_eq!(file.scopes.len(), 1);

        let config = file.scopes[0].clone().into_config().unwrap();
        assert_eq!(config.table(), "a");
        assert_eq!(config.column_type("count"), Some("int"));
        assert!(file.single_table.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StoreConfigFile::load(Path::new("/nonexistent/store.json")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
