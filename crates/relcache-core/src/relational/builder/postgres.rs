//! PostgreSQL dialect.

use super::{ParamStyle, SqlBuilder};
use crate::config::EngineConfig;
use crate::relational::operation::Operation;

/// Statement builder for PostgreSQL.
///
/// Printf-style markers are always `%s`, the type is left to the driver.
#[derive(Debug, Clone, Copy)]
pub struct PostgresBuilder {
    style: ParamStyle,
}

impl PostgresBuilder {
    /// Builder using `$1` placeholders, as the native driver expects.
    pub fn new() -> Self {
        Self::with_param_style(ParamStyle::Dollar)
    }

    pub fn with_param_style(style: ParamStyle) -> Self {
        Self { style }
    }
}

impl Default for PostgresBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlBuilder for PostgresBuilder {
    fn dialect(&self) -> &'static str {
        "postgresql"
    }

    fn param_style(&self) -> ParamStyle {
        self.style
    }

    fn default_column_type(&self, _unique: bool) -> &'static str {
        EngineConfig::POSTGRES_DEFAULT_COLUMN_TYPE
    }

    fn typed_format_placeholders(&self) -> bool {
        false
    }

    fn build_select_all_tables(&self) -> Operation {
        Operation::new(
            "SELECT tablename FROM pg_tables \
             WHERE schemaname = current_schema() ORDER BY tablename",
        )
    }

    fn build_select_table_columns(&self, table: &str, unique_only: bool) -> Operation {
        if unique_only {
            Operation::new(format!(
                "SELECT a.attname FROM pg_index i \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 WHERE i.indrelid = '{}'::regclass AND i.indisprimary \
                 ORDER BY array_position(i.indkey::int2[], a.attnum)",
                table
            ))
        } else {
            Operation::new(format!(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = '{}' \
                 ORDER BY ordinal_position",
                table
            ))
        }
    }

    fn column_name_index(&self, _unique_only: bool) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::table::TableConfig;
    use crate::value::{Row, Value};

    #[test]
    fn test_upsert_dollar() {
        let config = TableConfig::new("b", ["eid"], ["eid", "status"]).unwrap();
        let values: Row = [("status".to_string(), Value::from("ok"))].into_iter().collect();
        let op = PostgresBuilder::new()
            .build_upsert(&config, &[Value::from(7)], &values)
            .unwrap();
        assert_eq!(
            op.statement,
            "INSERT INTO b (eid, status) VALUES ($1, $2) \
             ON CONFLICT (eid) DO UPDATE SET status = $2"
        );
        assert_eq!(op.parameters.len(), 2);
    }

    #[test]
    fn test_format_is_untyped() {
        let config = TableConfig::new("b", ["eid"], ["status"]).unwrap();
        let op = PostgresBuilder::with_param_style(ParamStyle::Format)
            .build_delete(&config, Some(&[Value::from(7)]))
            .unwrap();
        assert_eq!(op.statement, "DELETE FROM b WHERE eid = %s");
    }

    #[test]
    fn test_primary_key_columns_in_key_order() {
        let op = PostgresBuilder::new().build_select_table_columns("b", true);
        assert!(op.statement.contains("indisprimary"));
        assert!(op.statement.contains("array_position"));
    }
}
