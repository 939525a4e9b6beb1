//! relcache - scoped key-value caching over relational databases.
//!
//! A cache entry is addressed by a `(key, scope)` pair. The relational
//! backends map each scope onto a table (or onto the leading primary-key
//! columns of one shared table) and each key onto a row, generating
//! dialect-correct SQL for SQLite, PostgreSQL and MySQL.
//!
//! # Example
//!
//! ```rust,no_run
//! use relcache::{Cache, CacheValue, Key, RelationalCache, TableConfig};
//!
//! fn main() -> relcache::Result<()> {
//!     let mut cache = RelationalCache::builder()
//!         .scope(
//!             TableConfig::builder("users")
//!                 .data_columns(["name", "age"])
//!                 .column_type("age", "int")
//!                 .build()?,
//!         )
//!         .open_sqlite("cache.db")?;
//!
//!     let scope = Key::from("users");
//!     let value = CacheValue::map([("name", "ada"), ("age", "36")]);
//!     cache.set(&Key::from("u1"), &value, Some(&scope))?;
//!     assert!(cache.exists(&Key::from("u1"), Some(&scope))?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod relational;
pub mod value;

pub use cache::{BackendRegistry, Cache, MemoryCache};
pub use config::{StoreConfigFile, StoreOptions};
pub use error::{CacheError, Result};
pub use relational::{
    ParamStyle, RelationalCache, RelationalEngine, RelationalStore, SingleTableCache,
    SingleTableConfig, TableConfig, TableSpec, ValueAdapter,
};
pub use value::{CacheValue, Key, Row, Value};
