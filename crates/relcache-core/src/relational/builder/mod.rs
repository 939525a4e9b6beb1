//! SQL generation for the relational cache.
//!
//! [`SqlBuilder`] turns a [`TableConfig`] plus a logical request into an
//! [`Operation`]. Statement shapes are shared by every dialect; a dialect
//! only supplies its introspection queries, default column types and the
//! upsert conflict clause. Parameter markers and parameter packaging follow
//! the builder's [`ParamStyle`].

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlBuilder;
pub use postgres::PostgresBuilder;
pub use sqlite::SqliteBuilder;

use super::operation::{Operation, Parameters};
use super::table::TableConfig;
use crate::error::{CacheError, Result};
use crate::value::{Row, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Placeholder convention of a database driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// `?`, ordered list.
    Qmark,
    /// `:1`, ordered list.
    Numeric,
    /// `:name`, name map.
    Named,
    /// `%s` / `%d` / `%f`, ordered list.
    Format,
    /// `%(name)s`, name map.
    Pyformat,
    /// `$1`, ordered list.
    Dollar,
}

impl ParamStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamStyle::Qmark => "qmark",
            ParamStyle::Numeric => "numeric",
            ParamStyle::Named => "named",
            ParamStyle::Format => "format",
            ParamStyle::Pyformat => "pyformat",
            ParamStyle::Dollar => "dollar",
        }
    }

    /// Whether parameters are packaged as a name map.
    pub fn is_named(&self) -> bool {
        matches!(self, ParamStyle::Named | ParamStyle::Pyformat)
    }
}

impl FromStr for ParamStyle {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "qmark" => Ok(ParamStyle::Qmark),
            "numeric" => Ok(ParamStyle::Numeric),
            "named" => Ok(ParamStyle::Named),
            "format" => Ok(ParamStyle::Format),
            "pyformat" => Ok(ParamStyle::Pyformat),
            "dollar" => Ok(ParamStyle::Dollar),
            _ => Err(CacheError::UnsupportedParamStyle {
                style: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects bound values while rendering their placeholders.
///
/// Numbered styles give a repeated `(column, value)` pair its first number
/// again, so each distinct binding is packaged once. Anonymous styles package
/// one value per placeholder, in emission order.
#[derive(Debug)]
pub struct Binder {
    style: ParamStyle,
    typed_format: bool,
    positional: Vec<(String, Value)>,
    named: IndexMap<String, Value>,
}

impl Binder {
    pub fn new(style: ParamStyle, typed_format: bool) -> Self {
        Self {
            style,
            typed_format,
            positional: Vec::new(),
            named: IndexMap::new(),
        }
    }

    fn format_code(&self, value: &Value) -> char {
        if !self.typed_format {
            return 's';
        }
        match value {
            Value::Integer(_) => 'd',
            Value::Real(_) => 'f',
            _ => 's',
        }
    }

    fn numbered(&mut self, name: &str, value: &Value) -> usize {
        if let Some(pos) = self
            .positional
            .iter()
            .position(|(n, v)| n == name && v == value)
        {
            return pos + 1;
        }
        self.positional.push((name.to_string(), value.clone()));
        self.positional.len()
    }

    /// Bind a value for `name` and return its placeholder.
    pub fn bind(&mut self, name: &str, value: &Value) -> String {
        match self.style {
            ParamStyle::Qmark => {
                self.positional.push((name.to_string(), value.clone()));
                "?".to_string()
            }
            ParamStyle::Format => {
                let code = self.format_code(value);
                self.positional.push((name.to_string(), value.clone()));
                format!("%{}", code)
            }
            ParamStyle::Numeric => format!(":{}", self.numbered(name, value)),
            ParamStyle::Dollar => format!("${}", self.numbered(name, value)),
            ParamStyle::Named => {
                self.named.insert(name.to_string(), value.clone());
                format!(":{}", name)
            }
            ParamStyle::Pyformat => {
                let code = self.format_code(value);
                self.named.insert(name.to_string(), value.clone());
                format!("%({}){}", name, code)
            }
        }
    }

    pub fn finish(self) -> Parameters {
        if self.style.is_named() {
            Parameters::Named(self.named)
        } else {
            Parameters::Positional(self.positional.into_iter().map(|(_, v)| v).collect())
        }
    }
}

/// Optional parts of a select statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions<'a> {
    /// Selected columns. Default: the data columns.
    pub columns: Option<&'a [String]>,
    pub limit: Option<usize>,
    pub distinct: bool,
}

impl<'a> SelectOptions<'a> {
    pub fn columns(columns: &'a [String]) -> Self {
        Self {
            columns: Some(columns),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Render `WHERE c1 = ? AND c2 = ?` for the leading columns matched by `key`.
fn where_clause(binder: &mut Binder, config: &TableConfig, key: &[Value]) -> Result<String> {
    let columns = config.unique_columns();
    if key.is_empty() || key.len() > columns.len() {
        return Err(CacheError::KeyArity {
            what: "key",
            expected: columns.len(),
            actual: key.len(),
        });
    }
    let conditions: Vec<String> = columns
        .iter()
        .zip(key)
        .map(|(col, value)| format!("{} = {}", col, binder.bind(col, value)))
        .collect();
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// Merge unique-column values with data-column assignments, in table column order.
///
/// Assignments to columns the table does not have are dropped.
fn merge_row(config: &TableConfig, key: &[Value], values: &Row) -> Result<Row> {
    let unique = config.unique_columns();
    if key.len() != unique.len() {
        return Err(CacheError::KeyArity {
            what: "key",
            expected: unique.len(),
            actual: key.len(),
        });
    }
    let unknown: Vec<&str> = values
        .keys()
        .filter(|name| !config.has_column(name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        debug!("Dropping columns {:?} not in table {}", unknown, config.table());
    }
    for (name, value) in values {
        if let Some(pos) = unique.iter().position(|c| c == name) {
            if !value.is_null() && *value != key[pos] {
                return Err(CacheError::KeyConflict {
                    column: name.clone(),
                    key: key[pos].to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    let mut row = Row::new();
    for col in config.columns_with_id() {
        if let Some(pos) = unique.iter().position(|c| c == col) {
            row.insert(col.clone(), key[pos].clone());
        } else if let Some(value) = values.get(col) {
            row.insert(col.clone(), value.clone());
        }
    }
    Ok(row)
}

/// Dialect-aware generator of cache operations.
pub trait SqlBuilder: Send + Sync + fmt::Debug {
    /// Dialect name, for logs.
    fn dialect(&self) -> &'static str;

    fn param_style(&self) -> ParamStyle;

    /// SQL type of a column with no configured type.
    fn default_column_type(&self, unique: bool) -> &'static str;

    /// Whether printf-style markers follow the value type (`%d`, `%f`).
    fn typed_format_placeholders(&self) -> bool {
        true
    }

    /// Operation listing every user table, name first.
    fn build_select_all_tables(&self) -> Operation;

    /// Operation listing the columns of `table`, or only its primary-key
    /// columns (in key order) when `unique_only` is set.
    fn build_select_table_columns(&self, table: &str, unique_only: bool) -> Operation;

    /// Position of the column name in a row returned by
    /// [`SqlBuilder::build_select_table_columns`].
    fn column_name_index(&self, unique_only: bool) -> usize;

    /// Conflict clause appended to `INSERT INTO t (...) VALUES (...)`.
    fn upsert_clause(&self, config: &TableConfig, assignments: &[String]) -> String {
        let target = config.unique_columns().join(", ");
        if assignments.is_empty() {
            format!("ON CONFLICT ({}) DO NOTHING", target)
        } else {
            format!(
                "ON CONFLICT ({}) DO UPDATE SET {}",
                target,
                assignments.join(", ")
            )
        }
    }

    fn binder(&self) -> Binder {
        Binder::new(self.param_style(), self.typed_format_placeholders())
    }

    fn column_name_from_row(&self, row: &[Value], unique_only: bool) -> Result<String> {
        let index = self.column_name_index(unique_only);
        match row.get(index) {
            Some(Value::Text(name)) => Ok(name.clone()),
            Some(other) => Err(CacheError::invalid_value(format!(
                "column name at position {} is not text: {}",
                index, other
            ))),
            None => Err(CacheError::invalid_value(format!(
                "introspection row has {} field(s), column name expected at {}",
                row.len(),
                index
            ))),
        }
    }

    fn column_sql_type<'a>(&self, config: &'a TableConfig, column: &str) -> &'a str {
        config
            .column_type(column)
            .unwrap_or_else(|| self.default_column_type(config.is_unique_column(column)))
    }

    fn build_create_table(&self, configs: &[&TableConfig]) -> Operation {
        let statements: Vec<String> = configs
            .iter()
            .map(|config| {
                let mut defs: Vec<String> = config
                    .columns_with_id()
                    .iter()
                    .map(|col| format!("{} {}", col, self.column_sql_type(config, col)))
                    .collect();
                defs.push(format!("PRIMARY KEY ({})", config.unique_columns().join(", ")));
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    config.table(),
                    defs.join(", ")
                )
            })
            .collect();

        if statements.len() > 1 {
            Operation::batch(statements.join(";\n"))
        } else {
            Operation::new(statements.concat())
        }
    }

    /// `SELECT [DISTINCT] cols FROM t [WHERE ...] [LIMIT n]`.
    ///
    /// `key` binds to the leading unique columns; `None` selects every row.
    fn build_select(
        &self,
        config: &TableConfig,
        key: Option<&[Value]>,
        options: SelectOptions<'_>,
    ) -> Result<Operation> {
        let columns = options.columns.unwrap_or(config.data_columns());
        let mut binder = self.binder();
        let mut stmt = format!(
            "SELECT {}{} FROM {}",
            if options.distinct { "DISTINCT " } else { "" },
            columns.join(", "),
            config.table()
        );
        if let Some(key) = key {
            stmt.push_str(&where_clause(&mut binder, config, key)?);
        }
        if let Some(limit) = options.limit {
            stmt.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(Operation::with_parameters(stmt, binder.finish()))
    }

    /// Insert-or-update of one row in a single statement.
    ///
    /// `values` holds data-column assignments; unique columns come from `key`.
    fn build_upsert(&self, config: &TableConfig, key: &[Value], values: &Row) -> Result<Operation> {
        let row = merge_row(config, key, values)?;
        let mut binder = self.binder();

        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = row
            .iter()
            .map(|(col, value)| binder.bind(col, value))
            .collect();
        let assignments: Vec<String> = row
            .iter()
            .filter(|(col, _)| !config.is_unique_column(col))
            .map(|(col, value)| format!("{} = {}", col, binder.bind(col, value)))
            .collect();

        let stmt = format!(
            "INSERT INTO {} ({}) VALUES ({}) {}",
            config.table(),
            columns.join(", "),
            placeholders.join(", "),
            self.upsert_clause(config, &assignments)
        );
        Ok(Operation::with_parameters(stmt, binder.finish()))
    }

    /// `DELETE FROM t [WHERE ...]`. `None` deletes every row of the table.
    fn build_delete(&self, config: &TableConfig, key: Option<&[Value]>) -> Result<Operation> {
        let mut binder = self.binder();
        let mut stmt = format!("DELETE FROM {}", config.table());
        if let Some(key) = key {
            stmt.push_str(&where_clause(&mut binder, config, key)?);
        }
        Ok(Operation::with_parameters(stmt, binder.finish()))
    }
}
