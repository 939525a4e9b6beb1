//! SQLite dialect.

use super::{ParamStyle, SqlBuilder};
use crate::config::SqliteConfig;
use crate::relational::operation::Operation;

/// Statement builder for SQLite.
#[derive(Debug, Clone, Copy)]
pub struct SqliteBuilder {
    style: ParamStyle,
}

impl SqliteBuilder {
    /// Builder using `?` placeholders.
    pub fn new() -> Self {
        Self::with_param_style(ParamStyle::Qmark)
    }

    pub fn with_param_style(style: ParamStyle) -> Self {
        Self { style }
    }
}

impl Default for SqliteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlBuilder for SqliteBuilder {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn param_style(&self) -> ParamStyle {
        self.style
    }

    fn default_column_type(&self, _unique: bool) -> &'static str {
        SqliteConfig::DEFAULT_COLUMN_TYPE
    }

    fn build_select_all_tables(&self) -> Operation {
        Operation::new(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
    }

    fn build_select_table_columns(&self, table: &str, unique_only: bool) -> Operation {
        if unique_only {
            Operation::new(format!(
                "SELECT * FROM pragma_table_info('{}') WHERE pk > 0 ORDER BY pk",
                table
            ))
        } else {
            Operation::new(format!("PRAGMA table_info('{}')", table))
        }
    }

    // cid, name, type, notnull, dflt_value, pk
    fn column_name_index(&self, _unique_only: bool) -> usize {
        1
    }
}
