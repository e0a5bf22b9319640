//! Redb table definitions for persistent record storage.

use redb::TableDefinition;

// Key: document id, Value: JSON-encoded DocumentRecord
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
