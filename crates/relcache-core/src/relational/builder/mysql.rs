//! MySQL dialect.

use super::{ParamStyle, SqlBuilder};
use crate::config::EngineConfig;
use crate::relational::operation::Operation;
use crate::relational::table::TableConfig;

/// Statement builder for MySQL.
#[derive(Debug, Clone, Copy)]
pub struct MysqlBuilder {
    style: ParamStyle,
}

impl MysqlBuilder {
    /// Builder using `?` placeholders.
    pub fn new() -> Self {
        Self::with_param_style(ParamStyle::Qmark)
    }

    pub fn with_param_style(style: ParamStyle) -> Self {
        Self { style }
    }
}

impl Default for MysqlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlBuilder for MysqlBuilder {
    fn dialect(&self) -> &'static str {
        "mysql"
    }

    fn param_style(&self) -> ParamStyle {
        self.style
    }

    fn default_column_type(&self, unique: bool) -> &'static str {
        if unique {
            EngineConfig::MYSQL_DEFAULT_KEY_COLUMN_TYPE
        } else {
            EngineConfig::MYSQL_DEFAULT_COLUMN_TYPE
        }
    }

    fn typed_format_placeholders(&self) -> bool {
        false
    }

    fn build_select_all_tables(&self) -> Operation {
        Operation::new("SHOW TABLES")
    }

    fn build_select_table_columns(&self, table: &str, unique_only: bool) -> Operation {
        if unique_only {
            Operation::new(format!(
                "SHOW INDEX FROM {} WHERE Key_name = 'PRIMARY'",
                table
            ))
        } else {
            Operation::new(format!("DESCRIBE {}", table))
        }
    }

    // SHOW INDEX: Table, Non_unique, Key_name, Seq_in_index, Column_name, ...
    fn column_name_index(&self, unique_only: bool) -> usize {
        if unique_only {
            4
        } else {
            0
        }
    }

    fn upsert_clause(&self, config: &TableConfig, assignments: &[String]) -> String {
        if assignments.is_empty() {
            // A self-assignment turns the duplicate into a no-op.
            let first = &config.unique_columns()[0];
            format!("ON DUPLICATE KEY UPDATE {} = {}", first, first)
        } else {
            format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
        }
    }
}
