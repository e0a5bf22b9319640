//! DocIO Object Store - byte storage with cold tiers
//!
//! The engine treats the object store as an external collaborator: this
//! crate defines the trait the engine programs against plus an in-memory
//! backend used by tests and the dev sweeper. The object store, not the
//! record store, is authoritative for storage tier and restore state.

pub mod memory;
pub mod store;

pub use memory::MemoryObjectStore;
pub use store::{ObjectRestore, ObjectStat, ObjectStore};
