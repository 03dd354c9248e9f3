//! Schema setup and version upgrades
//!
//! Object stores are only created when the requested version is higher than
//! the stored one. Stores that already exist are never altered.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::Result;

pub fn run_migrations(conn: &mut Connection, config: &StoreConfig) -> Result<()> {
    create_base_schema(conn)?;

    let stored = get_schema_version(conn)?;
    if config.version < stored {
        return Err(StorageError::VersionMismatch {
            requested: config.version,
            stored,
        });
    }

    if config.version > stored {
        upgrade(conn, stored, config)?;
    }

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn create_base_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS object_stores (
            name TEXT PRIMARY KEY,
            key_path TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            store TEXT NOT NULL,
            key_type INTEGER NOT NULL,
            key_num REAL NOT NULL DEFAULT 0,
            key_text TEXT NOT NULL DEFAULT '',
            value TEXT NOT NULL,
            PRIMARY KEY (store, key_type, key_num, key_text),
            FOREIGN KEY (store) REFERENCES object_stores(name) ON DELETE CASCADE
        );
    "#,
    )?;
    Ok(())
}

fn upgrade(conn: &mut Connection, from: u32, config: &StoreConfig) -> Result<()> {
    tracing::info!(
        database = %config.name,
        from,
        to = config.version,
        "Upgrading object store schema"
    );

    let created_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    for name in &config.collections {
        let created = tx.execute(
            "INSERT OR IGNORE INTO object_stores (name, key_path, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, config.key_path, created_at],
        )?;

        if created > 0 {
            tracing::info!(
                collection = %name,
                key_path = %config.key_path,
                "Created object store"
            );
        }
    }

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [config.version],
    )?;
    tx.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM object_stores ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_first_open_creates_stores() {
        let mut conn = Connection::open_in_memory().unwrap();
        let config = StoreConfig::new("sheets", "id", ["lines", "columns"]);

        run_migrations(&mut conn, &config).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert_eq!(store_names(&conn), vec!["columns", "lines"]);
    }

    #[test]
    fn test_same_version_does_not_add_stores() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, &StoreConfig::new("sheets", "id", ["columns"])).unwrap();

        let config = StoreConfig::new("sheets", "id", ["columns", "lines"]);
        run_migrations(&mut conn, &config).unwrap();

        assert_eq!(store_names(&conn), vec!["columns"]);
    }

    #[test]
    fn test_version_bump_adds_missing_stores() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, &StoreConfig::new("sheets", "id", ["columns"])).unwrap();

        let config = StoreConfig::new("sheets", "uid", ["columns", "lines"]).with_version(2);
        run_migrations(&mut conn, &config).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 2);
        assert_eq!(store_names(&conn), vec!["columns", "lines"]);

        // Existing store keeps its original key path
        let key_path: String = conn
            .query_row(
                "SELECT key_path FROM object_stores WHERE name = 'columns'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(key_path, "id");
    }

    #[test]
    fn test_downgrade_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let config = StoreConfig::new("sheets", "id", ["columns"]).with_version(3);
        run_migrations(&mut conn, &config).unwrap();

        let result = run_migrations(&mut conn, &config.clone().with_version(2));
        assert!(matches!(
            result,
            Err(StorageError::VersionMismatch {
                requested: 2,
                stored: 3
            })
        ));
    }
}
