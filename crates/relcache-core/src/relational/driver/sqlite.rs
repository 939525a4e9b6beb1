//! SQLite connection (rusqlite).

use super::{CursorMode, DbConnection, FetchSize, Record};
use crate::config::{SqliteConfig, StoreOptions};
use crate::error::{CacheError, Result};
use crate::relational::builder::ParamStyle;
use crate::relational::operation::{Operation, Parameters};
use crate::value::Value;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, Params, Statement, ToSql};
use std::path::Path;
use tracing::debug;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(
                std::str::from_utf8(t)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))?
                    .to_string(),
            ),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}

/// A SQLite database file or in-memory database.
///
/// The shared cursor is rusqlite's prepared-statement cache; a fresh cursor
/// is a one-shot prepared statement.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if path == Path::new(SqliteConfig::MEMORY_PATH) {
            return Self::open_in_memory();
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CacheError::Database {
            message: format!("Failed to open {}: {}", path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn, options)?;
        debug!("Opened SQLite database at {}", path.display());

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    fn configure_connection(conn: &Connection, options: &StoreOptions) -> Result<()> {
        conn.busy_timeout(options.busy_timeout())?;
        if options.wal {
            conn.execute_batch("PRAGMA journal_mode=WAL;\nPRAGMA synchronous=NORMAL;")?;
        }
        Ok(())
    }

    /// Underlying rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn run<P: Params>(stmt: &mut Statement<'_>, params: P, fetch: FetchSize) -> Result<Vec<Record>> {
    let columns = stmt.column_count();
    if columns == 0 {
        stmt.execute(params)?;
        return Ok(Vec::new());
    }

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while fetch.wants_more(records.len()) {
        match rows.next()? {
            Some(row) => records.push(
                (0..columns)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Record>>()?,
            ),
            None => break,
        }
    }
    Ok(records)
}

fn bind_and_run(
    stmt: &mut Statement<'_>,
    parameters: &Parameters,
    fetch: FetchSize,
) -> Result<Vec<Record>> {
    match parameters {
        Parameters::Positional(values) => run(stmt, params_from_iter(values.iter()), fetch),
        Parameters::Named(map) => {
            let names: Vec<String> = map.keys().map(|name| format!(":{}", name)).collect();
            let named: Vec<(&str, &dyn ToSql)> = names
                .iter()
                .zip(map.values())
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            run(stmt, named.as_slice(), fetch)
        }
    }
}

impl DbConnection for SqliteConnection {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn supports_param_style(&self, style: ParamStyle) -> bool {
        matches!(
            style,
            ParamStyle::Qmark | ParamStyle::Numeric | ParamStyle::Named
        )
    }

    fn execute(
        &mut self,
        op: &Operation,
        cursor: CursorMode,
        fetch: FetchSize,
    ) -> Result<Vec<Record>> {
        match cursor {
            CursorMode::Shared => {
                let mut stmt = self.conn.prepare_cached(&op.statement)?;
                bind_and_run(&mut stmt, &op.parameters, fetch)
            }
            CursorMode::Fresh => {
                let mut stmt = self.conn.prepare(&op.statement)?;
                bind_and_run(&mut stmt, &op.parameters, fetch)
            }
        }
    }

    fn execute_many(&mut self, op: &Operation) -> Result<()> {
        op.ensure_unbound()?;
        self.conn.execute_batch(&op.statement)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    fn memory() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_many(&Operation::batch(
            "CREATE TABLE t (id text, n int, r real, b blob, PRIMARY KEY (id));\n\
             INSERT INTO t VALUES ('a', 1, 0.5, x'0102');\n\
             INSERT INTO t VALUES ('b', 2, NULL, NULL);",
        ))
        .unwrap();
        conn
    }

    #[test]
    fn test_value_types_round_trip() {
        let mut conn = memory();
        let op = Operation::with_parameters(
            "SELECT id, n, r, b FROM t WHERE id = ?",
            Parameters::Positional(vec![Value::from("a")]),
        );
        let rows = conn.execute(&op, CursorMode::Shared, FetchSize::All).unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::from("a"),
                Value::Integer(1),
                Value::Real(0.5),
                Value::Blob(vec![1, 2]),
            ]]
        );
    }

    #[test]
    fn test_fetch_sizes() {
        let mut conn = memory();
        let op = Operation::new("SELECT id FROM t ORDER BY id");
        assert_eq!(
            conn.execute(&op, CursorMode::Shared, FetchSize::One).unwrap().len(),
            1
        );
        assert_eq!(
            conn.execute(&op, CursorMode::Shared, FetchSize::All).unwrap().len(),
            2
        );
        assert!(conn
            .execute(&op, CursorMode::Fresh, FetchSize::None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_write_runs_with_fetch_none() {
        let mut conn = memory();
        let delete = Operation::with_parameters(
            "DELETE FROM t WHERE id = ?",
            Parameters::Positional(vec![Value::from("b")]),
        );
        conn.execute(&delete, CursorMode::Fresh, FetchSize::None).unwrap();
        conn.commit().unwrap();

        let count = Operation::new("SELECT count(*) FROM t");
        let rows = conn.execute(&count, CursorMode::Shared, FetchSize::One).unwrap();
        assert_eq!(rows[0][0], Value::Integer(1));
    }

    #[test]
    fn test_numbered_and_named_binding() {
        let mut conn = memory();
        let op = Operation::with_parameters(
            "SELECT id FROM t WHERE id = :1 OR (n = :2 AND id <> :1)",
            Parameters::Positional(vec![Value::from("a"), Value::Integer(2)]),
        );
        let rows = conn.execute(&op, CursorMode::Fresh, FetchSize::All).unwrap();
        assert_eq!(rows.len(), 2);

        let mut named = IndexMap::new();
        named.insert("id".to_string(), Value::from("b"));
        let op = Operation::with_parameters(
            "SELECT n FROM t WHERE id = :id",
            Parameters::Named(named),
        );
        let rows = conn.execute(&op, CursorMode::Shared, FetchSize::One).unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2)]]);
    }

    #[test]
    fn test_batch_rejects_parameters() {
        let mut conn = memory();
        let mut op = Operation::batch("DELETE FROM t");
        op.parameters = Parameters::Positional(vec![Value::from(1)]);
        assert!(conn.execute_many(&op).is_err());
    }

    #[test]
    fn test_param_style_support() {
        let conn = memory();
        assert!(conn.supports_param_style(ParamStyle::Qmark));
        assert!(conn.supports_param_style(ParamStyle::Named));
        assert!(!conn.supports_param_style(ParamStyle::Format));
        assert!(!conn.supports_param_style(ParamStyle::Pyformat));
    }

    #[test]
    fn test_open_file_applies_wal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("cache.db");
        let mut conn = SqliteConnection::open(&path, &StoreOptions::default()).unwrap();
        assert!(path.exists());

        let rows = conn
            .execute(&Operation::new("PRAGMA journal_mode"), CursorMode::Fresh, FetchSize::One)
            .unwrap();
        assert_eq!(rows[0][0], Value::from("wal"));
        Box::new(conn).close().unwrap();
    }

    #[test]
    fn test_open_file_applies_busy_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let options = StoreOptions {
            busy_timeout_ms: 1234,
            wal: false,
            ..StoreOptions::default()
        };
        let mut conn = SqliteConnection::open(temp_dir.path().join("t.db"), &options).unwrap();

        let rows = conn
            .execute(&Operation::new("PRAGMA busy_timeout"), CursorMode::Fresh, FetchSize::One)
            .unwrap();
        assert_eq!(rows[0][0], Value::Integer(1234));
        let rows = conn
            .execute(&Operation::new("PRAGMA journal_mode"), CursorMode::Fresh, FetchSize::One)
            .unwrap();
        assert_eq!(rows[0][0], Value::from("delete"));
    }
}
