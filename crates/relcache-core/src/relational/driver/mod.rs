//! Database connections behind the relational engine.
//!
//! A [`DbConnection`] executes [`Operation`]s against one physical connection
//! and hands result rows back as [`Value`] records. SQLite is always built;
//! PostgreSQL and MySQL sit behind the `postgres` and `mysql` features.

mod sqlite;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;

pub use sqlite::SqliteConnection;

#[cfg(feature = "mysql")]
pub use self::mysql::MysqlConnection;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresConnection;

use super::builder::ParamStyle;
use super::operation::Operation;
use crate::error::Result;
use crate::value::Value;

/// One result row, in select-column order.
pub type Record = Vec<Value>;

/// Which cursor runs an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// The long-lived cursor used for sequential reads.
    Shared,
    /// A short-lived cursor, used for writes and schema changes.
    Fresh,
}

/// How many rows to pull back after executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSize {
    None,
    One,
    All,
    /// At most this many rows.
    Many(usize),
}

impl FetchSize {
    /// Whether another row should be pulled when `fetched` rows are held.
    pub fn wants_more(&self, fetched: usize) -> bool {
        match self {
            FetchSize::None => false,
            FetchSize::One => fetched < 1,
            FetchSize::All => true,
            FetchSize::Many(n) => fetched < *n,
        }
    }
}

/// A physical database connection.
pub trait DbConnection: Send {
    /// Backend name, for logs and errors.
    fn backend(&self) -> &'static str;

    /// Whether the driver can bind parameters rendered in `style`.
    fn supports_param_style(&self, style: ParamStyle) -> bool;

    /// Execute one bound statement and fetch up to `fetch` rows.
    fn execute(&mut self, op: &Operation, cursor: CursorMode, fetch: FetchSize)
        -> Result<Vec<Record>>;

    /// Execute a `;`-separated batch. Batches never carry parameters.
    fn execute_many(&mut self, op: &Operation) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Release the connection.
    fn close(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_size_limits() {
        assert!(!FetchSize::None.wants_more(0));
        assert!(FetchSize::One.wants_more(0));
        assert!(!FetchSize::One.wants_more(1));
        assert!(FetchSize::Many(3).wants_more(2));
        assert!(!FetchSize::Many(3).wants_more(3));
        assert!(FetchSize::All.wants_more(1000));
    }
}
