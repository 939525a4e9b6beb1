//! Execution layer of the relational cache.
//!
//! [`RelationalEngine`] pairs one [`DbConnection`] with one [`SqlBuilder`]
//! and exposes the row primitives every addressing scheme is built from.
//! Reads go through the shared cursor; writes and schema changes use a
//! fresh cursor and commit.

use super::builder::{SelectOptions, SqlBuilder, SqliteBuilder};
use super::driver::{CursorMode, DbConnection, FetchSize, Record, SqliteConnection};
use super::operation::Operation;
use super::table::TableConfig;
use crate::config::StoreOptions;
use crate::error::{CacheError, Result};
use crate::value::{CacheValue, Row, Value};
use std::path::Path;
use tracing::debug;

/// A column reported by table introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Part of the primary key.
    pub unique: bool,
}

/// Connection plus SQL dialect.
pub struct RelationalEngine {
    conn: Box<dyn DbConnection>,
    builder: Box<dyn SqlBuilder>,
}

impl std::fmt::Debug for RelationalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalEngine")
            .field("backend", &self.conn.backend())
            .field("builder", &self.builder)
            .finish()
    }
}

impl RelationalEngine {
    /// Pair a connection with a builder whose placeholders it can bind.
    pub fn new(conn: Box<dyn DbConnection>, builder: Box<dyn SqlBuilder>) -> Result<Self> {
        let style = builder.param_style();
        if !conn.supports_param_style(style) {
            return Err(CacheError::UnsupportedParamStyle {
                style: format!("{} ({} driver)", style, conn.backend()),
            });
        }
        Ok(Self { conn, builder })
    }

    /// Engine over a SQLite file, or `:memory:`.
    pub fn open_sqlite(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self> {
        let conn = SqliteConnection::open(path, options)?;
        Self::new(Box::new(conn), Box::new(SqliteBuilder::new()))
    }

    /// Engine over PostgreSQL, connected with a libpq-style URL.
    #[cfg(feature = "postgres")]
    pub fn connect_postgres(params: &str) -> Result<Self> {
        let conn = super::driver::PostgresConnection::connect(params)?;
        Self::new(
            Box::new(conn),
            Box::new(super::builder::PostgresBuilder::new()),
        )
    }

    /// Engine over MySQL, connected with a `mysql://` URL.
    #[cfg(feature = "mysql")]
    pub fn connect_mysql(url: &str) -> Result<Self> {
        let conn = super::driver::MysqlConnection::connect(url)?;
        Self::new(Box::new(conn), Box::new(super::builder::MysqlBuilder::new()))
    }

    pub fn builder(&self) -> &dyn SqlBuilder {
        self.builder.as_ref()
    }

    pub fn backend(&self) -> &'static str {
        self.conn.backend()
    }

    /// Execute operations in order and return the rows of the last one.
    ///
    /// Batch operations (`many`) go through the driver's batch path and
    /// yield no rows.
    pub fn execute(
        &mut self,
        ops: &[Operation],
        cursor: CursorMode,
        fetch: FetchSize,
        commit: bool,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for op in ops {
            debug!(
                "Executing {} ({} params, {:?} cursor)",
                op.statement,
                op.parameters.len(),
                cursor
            );
            if op.many {
                self.conn.execute_many(op)?;
                records.clear();
            } else {
                records = self.conn.execute(op, cursor, fetch)?;
            }
        }
        if commit {
            self.conn.commit()?;
        }
        Ok(records)
    }

    fn check_key(config: &TableConfig, key: &[Value]) -> Result<()> {
        let expected = config.unique_columns().len();
        if key.len() != expected {
            return Err(CacheError::KeyArity {
                what: "key",
                expected,
                actual: key.len(),
            });
        }
        Ok(())
    }

    pub fn exists_row(&mut self, key: &[Value], config: &TableConfig) -> Result<bool> {
        Self::check_key(config, key)?;
        let op = self.builder.build_select(
            config,
            Some(key),
            SelectOptions::columns(config.unique_columns()).limit(1),
        )?;
        let rows = self.execute(&[op], CursorMode::Shared, FetchSize::One, false)?;
        Ok(!rows.is_empty())
    }

    /// Fetch and parse the data columns of one row.
    pub fn fetch_row(&mut self, key: &[Value], config: &TableConfig) -> Result<Option<CacheValue>> {
        Self::check_key(config, key)?;
        let op = self
            .builder
            .build_select(config, Some(key), SelectOptions::default().limit(1))?;
        let mut rows = self.execute(&[op], CursorMode::Shared, FetchSize::One, false)?;
        match rows.pop() {
            Some(values) => Ok(Some(config.adapter().parse(config.data_columns(), values)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite one row.
    ///
    /// On a keys-only table the value is ignored and only the key is stored.
    pub fn set_row(&mut self, key: &[Value], value: &CacheValue, config: &TableConfig) -> Result<()> {
        Self::check_key(config, key)?;
        let values = if config.is_keys_only() {
            Row::new()
        } else {
            config.adapter().build(value, config.data_columns())?
        };
        let op = self.builder.build_upsert(config, key, &values)?;
        self.execute(&[op], CursorMode::Fresh, FetchSize::None, true)?;
        Ok(())
    }

    pub fn delete_row(&mut self, key: &[Value], config: &TableConfig) -> Result<()> {
        Self::check_key(config, key)?;
        self.delete_rows(Some(key), config)
    }

    /// Delete rows matching a leading part of the unique columns.
    ///
    /// `None` empties the table.
    pub fn delete_rows(&mut self, prefix: Option<&[Value]>, config: &TableConfig) -> Result<()> {
        let op = self.builder.build_delete(config, prefix)?;
        self.execute(&[op], CursorMode::Fresh, FetchSize::None, true)?;
        Ok(())
    }

    /// Select `columns` of every row matching a leading part of the unique
    /// columns, or of the whole table.
    pub fn select_rows(
        &mut self,
        config: &TableConfig,
        prefix: Option<&[Value]>,
        columns: &[String],
        distinct: bool,
    ) -> Result<Vec<Record>> {
        let mut options = SelectOptions::columns(columns);
        options.distinct = distinct;
        let op = self.builder.build_select(config, prefix, options)?;
        self.execute(&[op], CursorMode::Shared, FetchSize::All, false)
    }

    /// `CREATE TABLE IF NOT EXISTS` for each config.
    pub fn create_tables(&mut self, configs: &[&TableConfig]) -> Result<()> {
        if configs.is_empty() {
            return Ok(());
        }
        let op = self.builder.build_create_table(configs);
        self.execute(&[op], CursorMode::Fresh, FetchSize::None, true)?;
        Ok(())
    }

    /// Names of every user table.
    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        let op = self.builder.build_select_all_tables();
        let rows = self.execute(&[op], CursorMode::Fresh, FetchSize::All, false)?;
        rows.iter()
            .map(|row| match row.first() {
                Some(Value::Text(name)) => Ok(name.clone()),
                other => Err(CacheError::invalid_value(format!(
                    "unexpected table name in introspection row: {:?}",
                    other
                ))),
            })
            .collect()
    }

    /// Primary-key columns of a table, in key order.
    pub fn list_unique_columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.introspect_columns(table, true)
    }

    /// Every column of a table, in table order.
    pub fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let unique = self.list_unique_columns(table)?;
        Ok(self
            .introspect_columns(table, false)?
            .into_iter()
            .map(|name| ColumnInfo {
                unique: unique.contains(&name),
                name,
            })
            .collect())
    }

    fn introspect_columns(&mut self, table: &str, unique_only: bool) -> Result<Vec<String>> {
        let op = self.builder.build_select_table_columns(table, unique_only);
        let rows = self.execute(&[op], CursorMode::Fresh, FetchSize::All, false)?;
        rows.iter()
            .map(|row| self.builder.column_name_from_row(row, unique_only))
            .collect()
    }

    /// Release the connection.
    pub fn close(self) -> Result<()> {
        debug!("Closing {} connection", self.conn.backend());
        self.conn.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::builder::ParamStyle;
    use crate::relational::ValueAdapter;

    fn engine() -> RelationalEngine {
        RelationalEngine::open_sqlite(":memory:", &StoreOptions::default()).unwrap()
    }

    fn scope_a() -> TableConfig {
        TableConfig::builder("a")
            .unique_columns(["id"])
            .data_columns(["id", "name", "count"])
            .column_type("count", "int")
            .build()
            .unwrap()
    }

    fn key(s: &str) -> Vec<Value> {
        vec![Value::from(s)]
    }

    #[test]
    fn test_rejects_incompatible_param_style() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let err = RelationalEngine::new(
            Box::new(conn),
            Box::new(SqliteBuilder::with_param_style(ParamStyle::Pyformat)),
        )
        .unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedParamStyle { .. }));
    }

    #[test]
    fn test_row_primitives() {
        let mut engine = engine();
        let config = scope_a();
        engine.create_tables(&[&config]).unwrap();

        assert!(!engine.exists_row(&key("a1"), &config).unwrap());
        assert_eq!(engine.fetch_row(&key("a1"), &config).unwrap(), None);

        let value = CacheValue::map([("name", Value::from("jii")), ("count", Value::from(1))]);
        engine.set_row(&key("a1"), &value, &config).unwrap();
        assert!(engine.exists_row(&key("a1"), &config).unwrap());
        assert_eq!(
            engine.fetch_row(&key("a1"), &config).unwrap(),
            Some(CacheValue::map([
                ("id", Value::from("a1")),
                ("name", Value::from("jii")),
                ("count", Value::from(1)),
            ]))
        );

        engine.delete_row(&key("a1"), &config).unwrap();
        assert!(!engine.exists_row(&key("a1"), &config).unwrap());
    }

    #[test]
    fn test_set_overwrites_every_data_column() {
        let mut engine = engine();
        let config = scope_a();
        engine.create_tables(&[&config]).unwrap();

        let first = CacheValue::map([("name", Value::from("jii")), ("count", Value::from(1))]);
        engine.set_row(&key("a1"), &first, &config).unwrap();
        let second = CacheValue::map([("name", Value::from("jjii"))]);
        engine.set_row(&key("a1"), &second, &config).unwrap();

        let fetched = engine.fetch_row(&key("a1"), &config).unwrap().unwrap();
        let row = fetched.as_map().unwrap();
        assert_eq!(row["name"], Value::from("jjii"));
        assert!(row["count"].is_null());
    }

    #[test]
    fn test_key_arity_checked_before_sql() {
        let mut engine = engine();
        let config = scope_a();
        // No table exists: an arity error must win over a database error.
        let err = engine
            .exists_row(&[Value::from("a"), Value::from("b")], &config)
            .unwrap_err();
        assert!(matches!(err, CacheError::KeyArity { .. }));
    }

    #[test]
    fn test_introspection() {
        let mut engine = engine();
        let pairs = TableConfig::builder("pairs")
            .unique_columns(["id2", "id1"])
            .data_columns(["data"])
            .build()
            .unwrap();
        engine.create_tables(&[&scope_a(), &pairs]).unwrap();

        assert_eq!(engine.list_tables().unwrap(), vec!["a", "pairs"]);
        assert_eq!(engine.list_unique_columns("pairs").unwrap(), vec!["id2", "id1"]);

        let columns = engine.list_columns("pairs").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id2", "id1", "data"]);
        assert!(columns[0].unique && columns[1].unique && !columns[2].unique);
    }

    #[test]
    fn test_select_rows_and_delete_prefix() {
        let mut engine = engine();
        let config = TableConfig::builder("shared")
            .unique_columns(["ns", "id"])
            .data_columns(["data"])
            .adapter(ValueAdapter::Single)
            .build()
            .unwrap();
        engine.create_tables(&[&config]).unwrap();
        for (ns, id) in [("x", "1"), ("x", "2"), ("y", "1")] {
            engine
                .set_row(&[Value::from(ns), Value::from(id)], &CacheValue::from(id), &config)
                .unwrap();
        }

        let ns = vec!["ns".to_string()];
        let scopes = engine.select_rows(&config, None, &ns, true).unwrap();
        assert_eq!(scopes.len(), 2);

        let id = vec!["id".to_string()];
        let keys = engine
            .select_rows(&config, Some(&[Value::from("x")]), &id, false)
            .unwrap();
        assert_eq!(keys.len(), 2);

        engine.delete_rows(Some(&[Value::from("x")]), &config).unwrap();
        assert!(engine.select_rows(&config, None, &ns, true).unwrap().len() == 1);
    }

    #[test]
    fn test_keys_only_table_ignores_value() {
        let mut engine = engine();
        let config = TableConfig::new("tags", ["tag"], ["tag"]).unwrap();
        engine.create_tables(&[&config]).unwrap();

        engine
            .set_row(&key("rust"), &CacheValue::from("anything"), &config)
            .unwrap();
        engine
            .set_row(&key("rust"), &CacheValue::from("again"), &config)
            .unwrap();
        assert!(engine.exists_row(&key("rust"), &config).unwrap());
        assert_eq!(
            engine.fetch_row(&key("rust"), &config).unwrap(),
            Some(CacheValue::from("rust"))
        );
    }

    #[test]
    fn test_execute_fetches_many() {
        let mut engine = engine();
        let config = TableConfig::new("kv", ["id"], ["data"]).unwrap();
        engine.create_tables(&[&config]).unwrap();
        for id in ["k1", "k2", "k3"] {
            engine.set_row(&key(id), &CacheValue::from(id), &config).unwrap();
        }

        let op = engine
            .builder()
            .build_select(&config, None, SelectOptions::default())
            .unwrap();
        let rows = engine
            .execute(&[op], CursorMode::Shared, FetchSize::Many(2), false)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_close() {
        engine().close().unwrap();
    }
}
