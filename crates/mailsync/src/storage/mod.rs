//! Durable client-local state
//!
//! The trait-based design allows swapping between the in-memory store used
//! in tests and the SQLite store used by real front ends.

pub mod keys;
mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryKvStore;
pub use sqlite::{DEFAULT_DB_FILE, SqliteKvStore};
pub use traits::{KvStore, load_json, save_json};
