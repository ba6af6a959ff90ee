//! Persistence layer — key-value adapter, backends, and versioned records.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod record;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use record::Record;
pub use traits::{KeyValueStore, keys};
