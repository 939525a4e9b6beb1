//! Relational-database cache engine.
//!
//! Layers, leaf first:
//! - [`Operation`]: one SQL statement and its parameters;
//! - [`ValueAdapter`] and [`TableConfig`]: how a scope maps onto a table;
//! - [`SqlBuilder`]: dialect-aware SQL generation;
//! - [`DbConnection`]: the physical connection;
//! - [`RelationalEngine`]: execution and row primitives;
//! - [`RelationalStore`]: the [`Cache`](crate::Cache) front-end, with
//!   [`ScopeRegistry`] or [`SingleTable`] addressing.

mod adapter;
pub mod builder;
pub mod driver;
mod engine;
mod operation;
mod scoped;
mod single_table;
mod store;
mod table;

pub use adapter::ValueAdapter;
pub use builder::{
    Binder, MysqlBuilder, ParamStyle, PostgresBuilder, SelectOptions, SqlBuilder, SqliteBuilder,
};
pub use driver::{CursorMode, DbConnection, FetchSize, Record, SqliteConnection};
pub use engine::{ColumnInfo, RelationalEngine};
pub use operation::{Operation, Parameters};
pub use scoped::{RelationalCache, RelationalCacheBuilder, ScopeFactory, ScopeRegistry};
pub use single_table::{SingleTable, SingleTableCache};
pub use store::{Addressing, RelationalStore};
pub use table::{SingleTableConfig, TableConfig, TableConfigBuilder, TableSpec};

#[cfg(feature = "mysql")]
pub use driver::MysqlConnection;
#[cfg(feature = "postgres")]
pub use driver::PostgresConnection;
