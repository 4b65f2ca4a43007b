//! In-memory state repository.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use fleet_core::{FrameworkId, TaskDescriptor, TaskId};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::repository::StateRepository;

#[derive(Default)]
struct Inner {
    framework_id: Option<FrameworkId>,
    tasks: BTreeMap<TaskId, TaskDescriptor>,
}

/// Process-local repository. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStateRepository {
    inner: Mutex<Inner>,
}

impl MemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored descriptors.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StateError::Unavailable(e.to_string()))
    }
}

impl StateRepository for MemoryStateRepository {
    fn framework_id(&self) -> StateResult<Option<FrameworkId>> {
        Ok(self.lock()?.framework_id.clone())
    }

    fn set_framework_id(&self, id: &FrameworkId) -> StateResult<()> {
        self.lock()?.framework_id = Some(id.clone());
        Ok(())
    }

    fn store(&self, descriptors: &[TaskDescriptor]) -> StateResult<()> {
        let mut inner = self.lock()?;
        for descriptor in descriptors {
            inner
                .tasks
                .entry(descriptor.task_id.clone())
                .or_insert_with(|| descriptor.clone());
        }
        debug!(count = descriptors.len(), total = inner.tasks.len(), "descriptors stored in memory");
        Ok(())
    }

    fn remove(&self, task_id: &TaskId) -> StateResult<bool> {
        Ok(self.lock()?.tasks.remove(task_id).is_some())
    }

    fn all_task_infos(&self) -> StateResult<Vec<TaskDescriptor>> {
        Ok(self.lock()?.tasks.values().cloned().collect())
    }
}
