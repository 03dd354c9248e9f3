//! Database connection and object-store operations
//!
//! Every operation runs as its own implicit transaction. Nothing here
//! batches records together.

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Location, StoreConfig};
use crate::error::StorageError;
use crate::key::{validate_key_path, Key};
use crate::migrations::run_migrations;
use crate::Result;

const KEY_COLLATION: &str = "UTF16";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Object store name -> key path, fixed once opened
    stores: Arc<HashMap<String, String>>,
}

impl Database {
    /// Open (or create) the database described by `config`, creating any
    /// configured collection when the schema version goes up.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if config.version == 0 {
            return Err(StorageError::OpenFailed(
                "schema version must be at least 1".to_string(),
            ));
        }
        validate_key_path(&config.key_path)?;

        let conn = match &config.location {
            Location::Directory(dir) => {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::error!(
                        path = %dir.display(),
                        error = %e,
                        "Local storage is not available on this system"
                    );
                    return Err(StorageError::Unsupported(format!(
                        "{}: {}",
                        dir.display(),
                        e
                    )));
                }

                let path = dir.join(format!("{}.db", config.name));
                let conn = Connection::open(path)?;

                // WAL mode for better concurrent performance
                let _: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                conn
            }
            Location::Memory => Connection::open_in_memory()?,
        };

        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn, config)
    }

    fn from_connection(mut conn: Connection, config: &StoreConfig) -> Result<Self> {
        // Object-store cursors order strings by UTF-16 code units, not UTF-8 bytes
        conn.create_collation(KEY_COLLATION, |a: &str, b: &str| {
            a.encode_utf16().cmp(b.encode_utf16())
        })?;
        run_migrations(&mut conn, config)?;

        let stores = {
            let mut stmt = conn.prepare("SELECT name, key_path FROM object_stores")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<HashMap<String, String>>>()?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            stores: Arc::new(stores),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Names of the object stores, sorted
    pub fn object_store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }

    fn key_path(&self, store: &str) -> Result<&str> {
        self.stores
            .get(store)
            .map(String::as_str)
            .ok_or_else(|| StorageError::UnknownCollection(store.to_string()))
    }

    /// All records of `store` in key order
    pub fn get_all(&self, store: &str) -> Result<Vec<Value>> {
        self.key_path(store)?;

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT value FROM records WHERE store = ?1
                 ORDER BY key_type, key_num, key_text COLLATE UTF16",
            )?;

            let rows = stmt.query_map([store], |row| row.get::<_, String>(0))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(serde_json::from_str(&row?)?);
            }
            Ok(records)
        })
    }

    pub fn get(&self, store: &str, key: &Key) -> Result<Option<Value>> {
        self.key_path(store)?;
        let (key_type, key_num, key_text) = key.columns();

        let value: Option<String> = self.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM records
                     WHERE store = ?1 AND key_type = ?2 AND key_num = ?3 AND key_text = ?4",
                    rusqlite::params![store, key_type, key_num, key_text],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })?;

        value
            .map(|v| serde_json::from_str(&v))
            .transpose()
            .map_err(Into::into)
    }

    /// Insert a new record. Fails with `KeyExists` if its key is taken.
    pub fn add(&self, store: &str, record: &Value) -> Result<Key> {
        let key = Key::extract(record, self.key_path(store)?)?;
        let value = serde_json::to_string(record)?;
        let (key_type, key_num, key_text) = key.columns();

        let inserted = self.with_connection(|conn| {
            let inserted = conn.execute(
                "INSERT INTO records (store, key_type, key_num, key_text, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![store, key_type, key_num, key_text, value],
            );
            Ok(inserted)
        })?;

        match inserted {
            Ok(_) => Ok(key),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::KeyExists {
                    collection: store.to_string(),
                    key,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace a record under its key
    pub fn put(&self, store: &str, record: &Value) -> Result<Key> {
        let key = Key::extract(record, self.key_path(store)?)?;
        let value = serde_json::to_string(record)?;
        let (key_type, key_num, key_text) = key.columns();

        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records (store, key_type, key_num, key_text, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![store, key_type, key_num, key_text, value],
            )?;
            Ok(())
        })?;

        Ok(key)
    }

    /// Delete the record under `key`. A missing key is not an error.
    pub fn delete(&self, store: &str, key: &Key) -> Result<()> {
        self.key_path(store)?;
        let (key_type, key_num, key_text) = key.columns();

        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM records
                 WHERE store = ?1 AND key_type = ?2 AND key_num = ?3 AND key_text = ?4",
                rusqlite::params![store, key_type, key_num, key_text],
            )?;
            Ok(())
        })
    }

    pub fn clear(&self, store: &str) -> Result<()> {
        self.key_path(store)?;

        self.with_connection(|conn| {
            conn.execute("DELETE FROM records WHERE store = ?1", [store])?;
            Ok(())
        })
    }

    pub fn count(&self, store: &str) -> Result<u64> {
        self.key_path(store)?;

        self.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE store = ?1",
                [store],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            stores: Arc::clone(&self.stores),
        }
    }
}
