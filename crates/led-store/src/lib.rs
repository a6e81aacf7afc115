//! Key-value backends and the typed record store built on them.

mod memory;
mod records;
mod snapshot;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use led_types::{Collection, KvStore, Record, StoreError};
pub use memory::InMemoryKvStore;
pub use records::RecordStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKvStore;
