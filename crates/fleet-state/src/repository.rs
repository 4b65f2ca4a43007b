//! The state capability consumed by the scheduler.

use fleet_core::{FrameworkId, TaskDescriptor, TaskId};

use crate::error::StateResult;

/// Durable store of framework identity and launched task descriptors.
///
/// Implementations must be safe to share across threads; the scheduler
/// holds one behind an `Arc<dyn StateRepository>`.
pub trait StateRepository: Send + Sync {
    /// The persisted framework id, if the framework has registered before.
    fn framework_id(&self) -> StateResult<Option<FrameworkId>>;

    /// Persist the framework id, replacing any previous value.
    fn set_framework_id(&self, id: &FrameworkId) -> StateResult<()>;

    /// Persist descriptors. Idempotent: a descriptor whose task id is
    /// already stored is left as is. Either all descriptors become durable
    /// or an error is returned.
    fn store(&self, descriptors: &[TaskDescriptor]) -> StateResult<()>;

    /// Drop a descriptor once its task has terminated. Returns whether it existed.
    fn remove(&self, task_id: &TaskId) -> StateResult<bool>;

    /// Every descriptor believed to be running.
    fn all_task_infos(&self) -> StateResult<Vec<TaskDescriptor>>;
}
