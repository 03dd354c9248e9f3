//! Spreadsheet store
//!
//! Binds the local object store to the sheet's two collections. Records are
//! passed through untouched; batch calls return one result per record.

use serde_json::Value;
use tabula_storage::{LocalStore, StoreConfig};

use crate::config::Config;
use crate::Result;

pub const DATABASE_NAME: &str = "spreadsheetdb";
pub const SCHEMA_VERSION: u32 = 1;
pub const KEY_PATH: &str = "id";
pub const COLUMNS: &str = "columns";
pub const LINES: &str = "lines";

#[derive(Clone)]
pub struct SpreadsheetStore {
    store: LocalStore,
}

impl SpreadsheetStore {
    /// Open the spreadsheet database under `config.data_dir`.
    ///
    /// Returns immediately; calls made before the database is open wait for it.
    /// The open runs on the current Tokio runtime. Called outside one, every
    /// call fails with `StorageError::NoRuntime`.
    pub fn open(config: &Config) -> Self {
        Self::with_store_config(Self::store_config().in_directory(&config.data_dir))
    }

    pub fn in_memory() -> Self {
        Self::with_store_config(Self::store_config().in_memory())
    }

    fn with_store_config(config: StoreConfig) -> Self {
        tracing::debug!(location = ?config.location, "Opening spreadsheet store");
        Self {
            store: LocalStore::open(config),
        }
    }

    pub fn store_config() -> StoreConfig {
        StoreConfig::new(DATABASE_NAME, KEY_PATH, [COLUMNS, LINES]).with_version(SCHEMA_VERSION)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn ready(&self) -> Result<()> {
        Ok(self.store.ready().await?)
    }

    pub async fn get_columns(&self) -> Result<Vec<Value>> {
        Ok(self.store.list(COLUMNS).await?)
    }

    pub async fn get_lines(&self) -> Result<Vec<Value>> {
        Ok(self.store.list(LINES).await?)
    }

    pub async fn add_columns<I>(&self, columns: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        per_item(self.store.add_many(COLUMNS, columns).await)
    }

    pub async fn add_lines<I>(&self, lines: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        per_item(self.store.add_many(LINES, lines).await)
    }

    pub async fn update_columns<I>(&self, columns: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        per_item(self.store.update_many(COLUMNS, columns).await)
    }

    pub async fn update_lines<I>(&self, lines: I) -> Vec<Result<()>>
    where
        I: IntoIterator<Item = Value>,
    {
        per_item(self.store.update_many(LINES, lines).await)
    }
}

fn per_item(results: Vec<tabula_storage::Result<()>>) -> Vec<Result<()>> {
    results
        .into_iter()
        .map(|r| r.map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use serde_json::json;
    use tabula_storage::StorageError;

    #[tokio::test]
    async fn test_add_then_get_columns() {
        let sheet = SpreadsheetStore::in_memory();

        let results = sheet.add_columns(vec![json!({ "id": 1, "name": "A" })]).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let columns = sheet.get_columns().await.unwrap();
        assert_eq!(columns, vec![json!({ "id": 1, "name": "A" })]);
        assert!(sheet.get_lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_line_key() {
        let sheet = SpreadsheetStore::in_memory();

        let results = sheet
            .add_lines(vec![json!({ "id": 1, "v": 10 }), json!({ "id": 1, "v": 20 })])
            .await;
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CoreError::Storage(StorageError::KeyExists { .. }))
        ));

        assert_eq!(
            sheet.get_lines().await.unwrap(),
            vec![json!({ "id": 1, "v": 10 })]
        );
    }

    #[tokio::test]
    async fn test_update_replaces_value() {
        let sheet = SpreadsheetStore::in_memory();
        sheet
            .add_columns(vec![json!({ "id": 1, "name": "A" }), json!({ "id": 2, "name": "B" })])
            .await;

        let results = sheet
            .update_columns(vec![json!({ "id": 2, "name": "Total" })])
            .await;
        assert!(results[0].is_ok());

        assert_eq!(
            sheet.get_columns().await.unwrap(),
            vec![json!({ "id": 1, "name": "A" }), json!({ "id": 2, "name": "Total" })]
        );
    }

    #[tokio::test]
    async fn test_update_lines_upserts() {
        let sheet = SpreadsheetStore::in_memory();
        let results = sheet.update_lines(vec![json!({ "id": "r1", "cells": [1, 2] })]).await;
        assert!(results[0].is_ok());
        assert_eq!(
            sheet.get_lines().await.unwrap(),
            vec![json!({ "id": "r1", "cells": [1, 2] })]
        );
    }

    #[tokio::test]
    async fn test_collections_are_fixed() {
        let sheet = SpreadsheetStore::in_memory();
        sheet.ready().await.unwrap();

        assert_eq!(sheet.store().collections().await.unwrap(), vec![COLUMNS, LINES]);
        assert_eq!(sheet.store().config().key_path, KEY_PATH);
        assert_eq!(sheet.store().config().version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        {
            let sheet = SpreadsheetStore::open(&config);
            sheet.add_columns(vec![json!({ "id": 1, "name": "A" })]).await;
            sheet.add_lines(vec![json!({ "id": 1, "v": 10 })]).await;
        }

        let sheet = SpreadsheetStore::open(&config);
        assert_eq!(
            sheet.get_columns().await.unwrap(),
            vec![json!({ "id": 1, "name": "A" })]
        );
        assert_eq!(sheet.get_lines().await.unwrap(), vec![json!({ "id": 1, "v": 10 })]);
        assert!(dir.path().join("spreadsheetdb.db").exists());
    }

    #[tokio::test]
    async fn test_unusable_data_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sheet = SpreadsheetStore::open(&Config::new(file.path().join("data")));

        assert!(matches!(
            sheet.get_columns().await,
            Err(CoreError::Storage(StorageError::Unsupported(_)))
        ));
        let results = sheet.add_lines(vec![json!({ "id": 1 })]).await;
        assert!(matches!(
            results[0],
            Err(CoreError::Storage(StorageError::Unsupported(_)))
        ));
    }

    #[tokio::test]
    async fn test_newer_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();

        let newer = LocalStore::open(
            SpreadsheetStore::store_config()
                .with_version(SCHEMA_VERSION + 1)
                .in_directory(dir.path()),
        );
        newer.ready().await.unwrap();
        drop(newer);

        let sheet = SpreadsheetStore::open(&Config::new(dir.path().to_path_buf()));
        assert!(matches!(
            sheet.ready().await,
            Err(CoreError::Storage(StorageError::VersionMismatch {
                requested: SCHEMA_VERSION,
                ..
            }))
        ));
    }

    #[test]
    fn test_open_outside_runtime() {
        let sheet = SpreadsheetStore::in_memory();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        assert!(matches!(
            runtime.block_on(sheet.get_lines()),
            Err(CoreError::Storage(StorageError::NoRuntime))
        ));
    }
}
