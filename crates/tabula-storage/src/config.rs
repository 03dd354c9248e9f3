//! Store configuration

use std::path::PathBuf;

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// `<dir>/<name>.db` on disk
    Directory(PathBuf),
    /// Private in-memory database, discarded when the last handle drops
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database name, also the file stem on disk
    pub name: String,
    /// Schema version. Collections are only created when this is higher
    /// than the version already stored.
    pub version: u32,
    /// Key path shared by every configured collection
    pub key_path: String,
    /// Collections created on first open or upgrade
    pub collections: Vec<String>,
    pub location: Location,
}

impl StoreConfig {
    pub fn new<I, S>(name: impl Into<String>, key_path: impl Into<String>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            version: 1,
            key_path: key_path.into(),
            collections: collections.into_iter().map(Into::into).collect(),
            location: Location::Memory,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.location = Location::Directory(dir.into());
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.location = Location::Memory;
        self
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.location {
            Location::Directory(dir) => Some(dir.join(format!("{}.db", self.name))),
            Location::Memory => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = StoreConfig::new("sheets", "id", ["columns", "lines"]);
        assert_eq!(config.version, 1);
        assert_eq!(config.location, Location::Memory);
        assert_eq!(config.collections, vec!["columns", "lines"]);
        assert!(config.database_path().is_none());
    }

    #[test]
    fn test_database_path() {
        let config = StoreConfig::new("sheets", "id", ["columns"])
            .with_version(3)
            .in_directory("/var/lib/tabula");
        assert_eq!(config.version, 3);
        assert_eq!(
            config.database_path(),
            Some(PathBuf::from("/var/lib/tabula/sheets.db"))
        );
    }
}
