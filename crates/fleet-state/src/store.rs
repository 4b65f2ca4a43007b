//! RedbStateRepository — redb-backed durable state.
//!
//! Descriptors are JSON-serialized into the `tasks` table keyed by task id.
//! Each `store` call is a single write transaction, so all descriptors
//! packed into one offer become durable together. Supports both on-disk
//! and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use fleet_core::{FrameworkId, TaskDescriptor, TaskId};
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::repository::StateRepository;
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe durable repository backed by redb.
#[derive(Clone)]
pub struct RedbStateRepository {
    db: Arc<Database>,
}

impl RedbStateRepository {
    /// Open (or create) a persistent repository at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let repo = Self { db: Arc::new(db) };
        repo.ensure_tables()?;
        debug!(?path, "state repository opened");
        Ok(repo)
    }

    /// Create an ephemeral in-memory repository (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let repo = Self { db: Arc::new(db) };
        repo.ensure_tables()?;
        debug!("in-memory state repository opened");
        Ok(repo)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(FRAMEWORK).map_err(map_err!(Table))?;
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Look up a single descriptor by task id.
    pub fn get_task(&self, task_id: &TaskId) -> StateResult<Option<TaskDescriptor>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        match table.get(task_id.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let descriptor: TaskDescriptor =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(descriptor))
            }
            None => Ok(None),
        }
    }
}

impl StateRepository for RedbStateRepository {
    fn framework_id(&self) -> StateResult<Option<FrameworkId>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FRAMEWORK).map_err(map_err!(Table))?;
        let id = table
            .get(FRAMEWORK_ID_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| FrameworkId::new(guard.value()));
        Ok(id)
    }

    fn set_framework_id(&self, id: &FrameworkId) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(FRAMEWORK).map_err(map_err!(Table))?;
            table
                .insert(FRAMEWORK_ID_KEY, id.as_str())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(framework_id = %id, "framework id stored");
        Ok(())
    }

    fn store(&self, descriptors: &[TaskDescriptor]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut written = 0usize;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            for descriptor in descriptors {
                let key = descriptor.task_id.as_str();
                if table.get(key).map_err(map_err!(Read))?.is_some() {
                    continue;
                }
                let value = serde_json::to_vec(descriptor).map_err(map_err!(Serialize))?;
                table
                    .insert(key, value.as_slice())
                    .map_err(map_err!(Write))?;
                written += 1;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(requested = descriptors.len(), written, "descriptors stored");
        Ok(())
    }

    fn remove(&self, task_id: &TaskId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            existed = table
                .remove(task_id.as_str())
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%task_id, existed, "descriptor removed");
        Ok(existed)
    }

    fn all_task_infos(&self) -> StateResult<Vec<TaskDescriptor>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let descriptor: TaskDescriptor =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(descriptor);
        }
        Ok(results)
    }
}
