//! SQLite persistence: split read/write pool and the `MemoryStore`
//! implementation.

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteMemoryStore;
