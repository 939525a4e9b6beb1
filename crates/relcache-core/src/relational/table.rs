//! Static table descriptions.

use super::adapter::ValueAdapter;
use crate::config::EngineConfig;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Description of one table backing a scope.
///
/// Immutable once built. Column names are interpolated into SQL text as-is,
/// so they must come from trusted configuration, not from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    scope: String,
    table: String,
    unique_columns: Vec<String>,
    data_columns: Vec<String>,
    columns_with_id: Vec<String>,
    column_types: HashMap<String, String>,
    adapter: ValueAdapter,
}

impl TableConfig {
    /// Start building a config for a scope. The table defaults to the scope name.
    pub fn builder(scope: impl Into<String>) -> TableConfigBuilder {
        TableConfigBuilder::new(scope)
    }

    /// Config with explicit unique and data columns and default everything else.
    pub fn new<U, D, S>(scope: impl Into<String>, unique_columns: U, data_columns: D) -> Result<Self>
    where
        U: IntoIterator<Item = S>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(scope)
            .unique_columns(unique_columns)
            .data_columns(data_columns)
            .build()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn unique_columns(&self) -> &[String] {
        &self.unique_columns
    }

    pub fn data_columns(&self) -> &[String] {
        &self.data_columns
    }

    /// Unique columns not already in the data columns, then the data columns.
    pub fn columns_with_id(&self) -> &[String] {
        &self.columns_with_id
    }

    /// Explicit SQL type of a column, if one was configured.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn adapter(&self) -> ValueAdapter {
        self.adapter
    }

    pub fn is_unique_column(&self, column: &str) -> bool {
        self.unique_columns.iter().any(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns_with_id.iter().any(|c| c == column)
    }

    /// Every column is a unique column: a row records only that its key
    /// is present.
    pub fn is_keys_only(&self) -> bool {
        self.columns_with_id.len() == self.unique_columns.len()
    }
}

/// Builder for [`TableConfig`].
#[derive(Debug, Clone)]
pub struct TableConfigBuilder {
    scope: String,
    table: Option<String>,
    unique_columns: Vec<String>,
    data_columns: Option<Vec<String>>,
    column_types: HashMap<String, String>,
    adapter: Option<ValueAdapter>,
}

impl TableConfigBuilder {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            table: None,
            unique_columns: vec![EngineConfig::DEFAULT_UNIQUE_COLUMN.to_string()],
            data_columns: None,
            column_types: HashMap::new(),
            adapter: None,
        }
    }

    /// Physical table name.
    ///
    /// Default: the scope name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Columns that together identify a row, in key order.
    ///
    /// Default: `["id"]`
    pub fn unique_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Columns carrying the cached value.
    ///
    /// Default: `["data"]`
    pub fn data_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// SQL type of one column. Columns without one use the dialect default.
    pub fn column_type(mut self, column: impl Into<String>, sql_type: impl Into<String>) -> Self {
        self.column_types.insert(column.into(), sql_type.into());
        self
    }

    pub fn column_types(mut self, types: HashMap<String, String>) -> Self {
        self.column_types.extend(types);
        self
    }

    /// Value adapter.
    ///
    /// Default: single for one data column, identity otherwise
    pub fn adapter(mut self, adapter: ValueAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn build(self) -> Result<TableConfig> {
        let table = self.table.unwrap_or_else(|| self.scope.clone());
        let data_columns = self
            .data_columns
            .unwrap_or_else(|| vec![EngineConfig::DEFAULT_DATA_COLUMN.to_string()]);

        let invalid = |message: String| CacheError::InvalidTableConfig {
            table: table.clone(),
            message,
        };

        if table.is_empty() {
            return Err(invalid("table name is empty".to_string()));
        }
        if self.unique_columns.is_empty() {
            return Err(invalid("at least one unique column is required".to_string()));
        }
        for (kind, columns) in [("unique", &self.unique_columns), ("data", &data_columns)] {
            let mut seen = HashSet::new();
            for col in columns {
                if col.is_empty() {
                    return Err(invalid(format!("empty {} column name", kind)));
                }
                if !seen.insert(col.as_str()) {
                    return Err(invalid(format!("duplicated {} column: {}", kind, col)));
                }
            }
        }

        let adapter = self
            .adapter
            .unwrap_or_else(|| ValueAdapter::default_for(&data_columns));
        adapter.validate(&data_columns)?;

        let columns_with_id: Vec<String> = self
            .unique_columns
            .iter()
            .filter(|col| !data_columns.contains(col))
            .chain(data_columns.iter())
            .cloned()
            .collect();

        Ok(TableConfig {
            scope: self.scope,
            table,
            unique_columns: self.unique_columns,
            data_columns,
            columns_with_id,
            column_types: self.column_types,
            adapter,
        })
    }
}

/// Serializable form of a [`TableConfig`], as kept in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default = "default_unique_columns")]
    pub unique_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_columns: Option<Vec<String>>,
    #[serde(default)]
    pub column_types: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<ValueAdapter>,
}

fn default_unique_columns() -> Vec<String> {
    vec![EngineConfig::DEFAULT_UNIQUE_COLUMN.to_string()]
}

impl TableSpec {
    pub fn into_config(self) -> Result<TableConfig> {
        let mut builder = TableConfig::builder(self.scope)
            .unique_columns(self.unique_columns)
            .column_types(self.column_types);
        if let Some(table) = self.table {
            builder = builder.table(table);
        }
        if let Some(columns) = self.data_columns {
            builder = builder.data_columns(columns);
        }
        if let Some(adapter) = self.adapter {
            builder = builder.adapter(adapter);
        }
        builder.build()
    }
}

/// A table shared by many scopes.
///
/// The leading `scope_columns` unique columns hold the scope, the remaining
/// unique columns hold the key.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleTableConfig {
    config: TableConfig,
    scope_columns: usize,
}

impl SingleTableConfig {
    pub fn new(config: TableConfig, scope_columns: usize) -> Result<Self> {
        let unique = config.unique_columns().len();
        if scope_columns == 0 || scope_columns >= unique {
            return Err(CacheError::InvalidTableConfig {
                table: config.table().to_string(),
                message: format!(
                    "{} scope column(s) leave no room for key columns among {} unique column(s)",
                    scope_columns, unique
                ),
            });
        }
        Ok(Self {
            config,
            scope_columns,
        })
    }

    pub fn table_config(&self) -> &TableConfig {
        &self.config
    }

    pub fn scope_columns(&self) -> &[String] {
        &self.config.unique_columns()[..self.scope_columns]
    }

    pub fn key_columns(&self) -> &[String] {
        &self.config.unique_columns()[self.scope_columns..]
    }
}
