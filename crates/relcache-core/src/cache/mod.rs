//! Top-level cache contract and its non-relational variants.
//!
//! Every backend implements [`Cache`]. [`BackendRegistry`] builds a backend
//! from a URI such as `sqlite:///var/cache/app.db` or `memory://`.

mod memory;
mod traits;
mod uri;

pub use memory::MemoryCache;
pub use traits::{Cache, ComputeFn};
pub use uri::{BackendConstructor, BackendRegistry};
