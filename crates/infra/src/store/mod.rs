//! Persistence boundary.
//!
//! Every inbound operation runs inside one unit of work (`StoreTx`) opened from a
//! `Store`. Reads and writes made through the unit of work become visible only
//! on `commit()`; dropping it discards them.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{Store, StoreError, StoreResult, StoreTx};
