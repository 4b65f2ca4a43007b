//! The outbound channel to the cluster resource manager.

use fleet_core::{OfferId, TaskDescriptor, TaskId};
use thiserror::Error;

/// Failure to deliver an instruction to the resource manager.
///
/// Always fatal: the scheduler does not retry locally and relies on a
/// supervised restart plus reconciliation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver disconnected: {0}")]
    Disconnected(String),

    #[error("instruction rejected: {0}")]
    Rejected(String),

    #[error("driver i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Instructions the scheduler sends to the resource manager.
///
/// Implemented by the transport layer in production and by recording
/// doubles in tests.
pub trait ClusterDriver: Send + Sync {
    /// Launch `tasks` using the resources of a single offer.
    fn launch_tasks(&self, offer_id: &OfferId, tasks: &[TaskDescriptor]) -> Result<(), DriverError>;

    /// Return an offer unused.
    fn decline_offer(&self, offer_id: &OfferId) -> Result<(), DriverError>;

    /// Ask the resource manager for the current status of `tasks`.
    fn reconcile_tasks(&self, tasks: &[TaskId]) -> Result<(), DriverError>;
}
