//! The key-value directory contract the placement store is built on.
//!
//! Any linearizable key-value service can back the store as long as it
//! offers single-key get/set/delete and a recursive listing of everything
//! under a directory prefix. Directories are implicit: a directory exists
//! as long as some key lives beneath it.

use std::future::Future;
use std::pin::Pin;

use crate::error::StateResult;

/// Boxed future alias for directory operations.
pub type KvFuture<'a, T> = Pin<Box<dyn Future<Output = StateResult<T>> + Send + 'a>>;

/// A single key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// A directory-style key-value service.
///
/// Implementations report a missing key as [`StateError::NotFound`]
/// from `get` and `delete`; deciding whether that matters is left to
/// the caller.
///
/// [`StateError::NotFound`]: crate::StateError::NotFound
pub trait KvDirectory: Send + Sync {
    /// Read the value stored at `key`.
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, String>;

    /// List every entry below `dir` (recursively), ordered by full key.
    ///
    /// A directory with no entries yields an empty list.
    fn list<'a>(&'a self, dir: &'a str) -> KvFuture<'a, Vec<KvEntry>>;

    /// Create or overwrite `key`.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> KvFuture<'a, ()>;

    /// Delete a single key.
    fn delete<'a>(&'a self, key: &'a str) -> KvFuture<'a, ()>;

    /// Delete everything below `dir`. Returns the number of keys removed.
    fn delete_prefix<'a>(&'a self, dir: &'a str) -> KvFuture<'a, u64>;
}

/// Prefix used to match the contents of `dir`.
pub(crate) fn dir_prefix(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}
