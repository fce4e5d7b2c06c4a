//! # mw-store-memory
//!
//! Process-local implementations of `EntryStore` and `MediaStore`. Used for
//! demos, the `db-memory`/`storage-memory` builds and the API tests.
//! Nothing survives a restart.

mod entries;
mod media;

pub use entries::MemoryEntryStore;
pub use media::MemoryMediaStore;
