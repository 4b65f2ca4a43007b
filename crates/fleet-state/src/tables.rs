//! redb table definitions for the Fleet state repository.
//!
//! Values are JSON-serialized domain types.

use redb::TableDefinition;

/// Framework identity, stored under [`FRAMEWORK_ID_KEY`].
pub const FRAMEWORK: TableDefinition<&str, &str> = TableDefinition::new("framework");

/// Task descriptors keyed by task id.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

pub const FRAMEWORK_ID_KEY: &str = "id";
