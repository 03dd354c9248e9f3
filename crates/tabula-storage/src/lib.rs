//! Tabula Storage Layer
//!
//! Object-store persistence on SQLite: named collections of JSON records,
//! each keyed by a key path. The connection opens in the background and
//! every operation waits for it to become ready.

mod config;
mod database;
mod error;
mod key;
mod migrations;
mod store;

pub use config::{Location, StoreConfig};
pub use database::Database;
pub use error::StorageError;
pub use key::Key;
pub use store::LocalStore;

pub type Result<T> = std::result::Result<T, StorageError>;
