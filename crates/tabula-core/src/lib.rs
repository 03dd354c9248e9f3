//! Tabula Core
//!
//! Spreadsheet persistence: the "columns" and "lines" collections of a
//! sheet, kept in the local object store.

mod config;
mod error;
mod spreadsheet;

pub use config::Config;
pub use error::CoreError;
pub use spreadsheet::{SpreadsheetStore, COLUMNS, DATABASE_NAME, KEY_PATH, LINES, SCHEMA_VERSION};

pub use tabula_storage::{Key, LocalStore, StorageError, StoreConfig};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
