//! DocIO Record Store - the unit of truth for document records
//!
//! A key-value store of [`docio_common::DocumentRecord`] keyed by document
//! id. The conditional-create primitive is the system's sole serialization
//! point: two concurrent upload paths both try to create, exactly one wins,
//! and the loser falls back to an update. No external locks anywhere.

pub mod memory;
pub mod store;
pub mod tables;

pub use memory::MemoryRecordStore;
pub use store::{CreateOutcome, RecordStore, RedbRecordStore};
