//! Cache trait.

use crate::error::{CacheError, Result};
use crate::value::{CacheValue, Key};

/// Callback producing a value for a missing key.
pub type ComputeFn<'a> = &'a mut dyn FnMut() -> Result<CacheValue>;

/// Scoped key-value cache.
///
/// A key lives under a scope. Backends with a single namespace accept
/// `None` as the scope; the relational backends require one.
/// All operations are synchronous and block until the backend answers.
pub trait Cache: Send {
    /// Backend name used in errors.
    fn backend(&self) -> &'static str;

    fn exists(&mut self, key: &Key, scope: Option<&Key>) -> Result<bool>;

    /// Stored value, or `None` if the key is absent.
    fn fetch(&mut self, key: &Key, scope: Option<&Key>) -> Result<Option<CacheValue>>;

    /// Stored value, or `default` if the key is absent.
    fn fetch_or(
        &mut self,
        key: &Key,
        scope: Option<&Key>,
        default: CacheValue,
    ) -> Result<CacheValue> {
        Ok(self.fetch(key, scope)?.unwrap_or(default))
    }

    /// Insert or overwrite a value.
    fn set(&mut self, key: &Key, value: &CacheValue, scope: Option<&Key>) -> Result<bool>;

    /// Overwrite a value, returning the previous one when the backend
    /// tracks it. The default is a plain [`Cache::set`] returning `None`.
    fn update(
        &mut self,
        key: &Key,
        value: &CacheValue,
        scope: Option<&Key>,
    ) -> Result<Option<CacheValue>> {
        self.set(key, value, scope)?;
        Ok(None)
    }

    /// Delete a value. Deleting an absent key is not an error.
    fn pop(&mut self, key: &Key, scope: Option<&Key>) -> Result<()>;

    /// Fetch a value, or compute and store it when absent.
    ///
    /// Without `compute` this is [`Cache::fetch`]. The check and the store
    /// are separate calls, so concurrent callers may both compute.
    fn get(
        &mut self,
        key: &Key,
        scope: Option<&Key>,
        compute: Option<ComputeFn<'_>>,
    ) -> Result<Option<CacheValue>> {
        let compute = match compute {
            Some(compute) if !self.exists(key, scope)? => compute,
            _ => return self.fetch(key, scope),
        };
        let value = compute()?;
        self.set(key, &value, scope)?;
        Ok(Some(value))
    }

    fn scopes(&mut self) -> Result<Vec<Key>> {
        Err(CacheError::Unsupported {
            operation: "scopes",
            backend: self.backend(),
        })
    }

    fn keys(&mut self, _scope: Option<&Key>) -> Result<Vec<Key>> {
        Err(CacheError::Unsupported {
            operation: "keys",
            backend: self.backend(),
        })
    }
}
