//! Adapters layer: Concrete implementations of ports.
//!
//! - `file`: model artifacts as files, identity = path
//! - `sqlite`: model artifacts as BLOB rows, identity = key

mod error;
pub mod file;
pub mod sqlite;

pub use error::StorageError;
pub use file::FileModelStore;
pub use sqlite::SqliteModelStore;
