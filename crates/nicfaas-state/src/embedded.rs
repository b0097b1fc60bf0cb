//! Embedded directory backend built on redb.
//!
//! All keys live in a single `&str -> &str` table; directory listings are
//! prefix scans over it. Suitable for a single control-plane process that
//! wants its placement state to survive restarts.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::directory::{KvDirectory, KvEntry, KvFuture, dir_prefix};
use crate::error::{StateError, StateResult};

/// Directory entries keyed by full path.
const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe directory backed by redb.
#[derive(Clone)]
pub struct RedbDirectory {
    db: Arc<Database>,
}

impl RedbDirectory {
    /// Open (or create) a persistent directory at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let dir = Self { db: Arc::new(db) };
        dir.ensure_tables()?;
        debug!(?path, "redb directory opened");
        Ok(dir)
    }

    /// Create an ephemeral in-memory directory.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let dir = Self { db: Arc::new(db) };
        dir.ensure_tables()?;
        debug!("in-memory redb directory opened");
        Ok(dir)
    }

    /// Run `op` on the blocking pool; redb commits hit the disk.
    async fn blocking<T, F>(&self, op: F) -> StateResult<T>
    where
        F: FnOnce(&RedbDirectory) -> StateResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let dir = self.clone();
        tokio::task::spawn_blocking(move || op(&dir))
            .await
            .map_err(|e| StateError::Transaction(format!("blocking task failed: {e}")))?
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(ENTRIES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_sync(&self, key: &str) -> StateResult<String> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTRIES).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(guard.value().to_string()),
            None => Err(StateError::NotFound(key.to_string())),
        }
    }

    fn list_sync(&self, dir: &str) -> StateResult<Vec<KvEntry>> {
        let prefix = dir_prefix(dir);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTRIES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                results.push(KvEntry {
                    key: key.value().to_string(),
                    value: value.value().to_string(),
                });
            }
        }
        Ok(results)
    }

    fn set_sync(&self, key: &str, value: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn delete_sync(&self, key: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(ENTRIES).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if existed {
            Ok(())
        } else {
            Err(StateError::NotFound(key.to_string()))
        }
    }

    fn delete_prefix_sync(&self, dir: &str) -> StateResult<u64> {
        let keys: Vec<String> = self.list_sync(dir)?.into_iter().map(|e| e.key).collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%dir, removed = keys.len(), "directory cleared");
        Ok(keys.len() as u64)
    }
}

impl KvDirectory for RedbDirectory {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, String> {
        let key = key.to_string();
        Box::pin(async move { self.blocking(move |d| d.get_sync(&key)).await })
    }

    fn list<'a>(&'a self, dir: &'a str) -> KvFuture<'a, Vec<KvEntry>> {
        let dir = dir.to_string();
        Box::pin(async move { self.blocking(move |d| d.list_sync(&dir)).await })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> KvFuture<'a, ()> {
        let (key, value) = (key.to_string(), value.to_string());
        Box::pin(async move { self.blocking(move |d| d.set_sync(&key, &value)).await })
    }

    fn delete<'a>(&'a self, key: &'a str) -> KvFuture<'a, ()> {
        let key = key.to_string();
        Box::pin(async move { self.blocking(move |d| d.delete_sync(&key)).await })
    }

    fn delete_prefix<'a>(&'a self, dir: &'a str) -> KvFuture<'a, u64> {
        let dir = dir.to_string();
        Box::pin(async move { self.blocking(move |d| d.delete_prefix_sync(&dir)).await })
    }
}
