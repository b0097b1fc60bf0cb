//! In-memory directory backend.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::directory::{KvDirectory, KvEntry, KvFuture, dir_prefix};
use crate::error::StateError;

/// Ordered in-memory directory. Cheap to clone; clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("directory lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvDirectory for MemoryDirectory {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, String> {
        Box::pin(async move {
            let entries = self.entries.read().expect("directory lock");
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| StateError::NotFound(key.to_string()))
        })
    }

    fn list<'a>(&'a self, dir: &'a str) -> KvFuture<'a, Vec<KvEntry>> {
        Box::pin(async move {
            let prefix = dir_prefix(dir);
            let entries = self.entries.read().expect("directory lock");
            Ok(entries
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| KvEntry {
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> KvFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().expect("directory lock");
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> KvFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().expect("directory lock");
            entries
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StateError::NotFound(key.to_string()))
        })
    }

    fn delete_prefix<'a>(&'a self, dir: &'a str) -> KvFuture<'a, u64> {
        Box::pin(async move {
            let prefix = dir_prefix(dir);
            let mut entries = self.entries.write().expect("directory lock");
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(&prefix));
            Ok((before - entries.len()) as u64)
        })
    }
}
