//! Asynchronous object store adapter
//!
//! `LocalStore::open` returns immediately and opens the database on the
//! blocking pool. The open result is published once through a watch channel;
//! every operation waits on that channel, so calls made while the connection
//! is still opening are deferred rather than dropped.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::StoreConfig;
use crate::database::Database;
use crate::error::StorageError;
use crate::key::Key;
use crate::Result;

#[derive(Clone)]
enum OpenState {
    Opening,
    Ready(Database),
    Failed(Arc<StorageError>),
}

/// Rebuild an open failure for one caller, keeping its kind
fn open_error(e: &StorageError) -> StorageError {
    match e {
        StorageError::Unsupported(reason) => StorageError::Unsupported(reason.clone()),
        StorageError::VersionMismatch { requested, stored } => StorageError::VersionMismatch {
            requested: *requested,
            stored: *stored,
        },
        StorageError::InvalidKeyPath(path) => StorageError::InvalidKeyPath(path.clone()),
        StorageError::NoRuntime => StorageError::NoRuntime,
        StorageError::OpenFailed(reason) => StorageError::OpenFailed(reason.clone()),
        other => StorageError::OpenFailed(other.to_string()),
    }
}

#[derive(Clone)]
pub struct LocalStore {
    config: Arc<StoreConfig>,
    state: watch::Receiver<OpenState>,
}

impl LocalStore {
    /// Start opening the database described by `config`.
    ///
    /// The open runs on the current Tokio runtime. Without one the store is
    /// failed from the start and every call returns `NoRuntime`.
    pub fn open(config: StoreConfig) -> Self {
        Self::with_opener(config, Database::open)
    }

    pub(crate) fn with_opener<F>(config: StoreConfig, opener: F) -> Self
    where
        F: FnOnce(&StoreConfig) -> Result<Database> + Send + 'static,
    {
        let config = Arc::new(config);
        let (tx, rx) = watch::channel(OpenState::Opening);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(database = %config.name, "No Tokio runtime to open local store");
                tx.send_replace(OpenState::Failed(Arc::new(StorageError::NoRuntime)));
                return Self { config, state: rx };
            }
        };

        let task_config = Arc::clone(&config);
        runtime.spawn_blocking(move || {
            let state = match opener(&task_config) {
                Ok(db) => {
                    tracing::info!(
                        database = %task_config.name,
                        version = task_config.version,
                        collections = ?db.object_store_names(),
                        "Local store ready"
                    );
                    OpenState::Ready(db)
                }
                Err(e) => {
                    tracing::error!(database = %task_config.name, error = %e, "Failed to open local store");
                    OpenState::Failed(Arc::new(e))
                }
            };
            tx.send_replace(state);
        });

        Self { config, state: rx }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), OpenState::Ready(_))
    }

    /// Wait until the connection has opened. Surfaces the open failure, if any.
    pub async fn ready(&self) -> Result<()> {
        self.database().await.map(|_| ())
    }

    async fn database(&self) -> Result<Database> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| !matches!(s, OpenState::Opening))
            .await
            .map_err(|_| StorageError::OpenFailed("open task ended without a result".to_string()))?;

        match &*state {
            OpenState::Ready(db) => Ok(db.clone()),
            OpenState::Failed(e) => Err(open_error(e)),
            OpenState::Opening => Err(StorageError::OpenFailed("database is still opening".to_string())),
        }
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.database().await?;
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Collections present in the opened database
    pub async fn collections(&self) -> Result<Vec<String>> {
        Ok(self.database().await?.object_store_names())
    }

    /// Every record of `collection`, in key order
    pub async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let name = collection.to_string();
        let records = self.run(move |db| db.get_all(&name)).await?;
        tracing::debug!(collection = %collection, count = records.len(), "Listed records");
        Ok(records)
    }

    pub async fn get(&self, collection: &str, key: impl Into<Key>) -> Result<Option<Value>> {
        let name = collection.to_string();
        let key = key.into();
        self.run(move |db| db.get(&name, &key)).await
    }

    pub async fn count(&self, collection: &str) -> Result<u64> {
        let name = collection.to_string();
        self.run(move |db| db.count(&name)).await
    }

    /// Insert one record; fails with `KeyExists` if its key is already stored.
    pub async fn add(&self, collection: &str, record: Value) -> Result<()> {
        let name = collection.to_string();
        match self.run(move |db| db.add(&name, &record)).await {
            Ok(key) => {
                tracing::debug!(collection = %collection, %key, "Added record");
                Ok(())
            }
            Err(e @ StorageError::KeyExists { .. }) => {
                tracing::warn!(collection = %collection, error = %e, "Rejected duplicate record");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Add each record on its own, in input order. One result per record;
    /// a failure does not undo earlier records or skip later ones.
    pub async fn add_many<I>(&self, collection: &str, records: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut results = Vec::new();
        for record in records {
            results.push(self.add(collection, record).await);
        }
        results
    }

    /// Insert or replace one record under its key
    pub async fn update(&self, collection: &str, record: Value) -> Result<()> {
        let name = collection.to_string();
        let key = self.run(move |db| db.put(&name, &record)).await?;
        tracing::debug!(collection = %collection, %key, "Updated record");
        Ok(())
    }

    /// Update each record on its own, in input order. One result per record.
    pub async fn update_many<I>(&self, collection: &str, records: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut results = Vec::new();
        for record in records {
            results.push(self.update(collection, record).await);
        }
        results
    }

    /// Delete the record under `key`; an absent key still succeeds.
    pub async fn remove(&self, collection: &str, key: impl Into<Key>) -> Result<()> {
        let name = collection.to_string();
        let key = key.into();
        let removed = key.clone();
        self.run(move |db| db.delete(&name, &key)).await?;
        tracing::debug!(collection = %collection, key = %removed, "Removed record");
        Ok(())
    }

    pub async fn clear(&self, collection: &str) -> Result<()> {
        let name = collection.to_string();
        self.run(move |db| db.clear(&name)).await?;
        tracing::debug!(collection = %collection, "Cleared collection");
        Ok(())
    }
}
