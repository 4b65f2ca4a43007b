//! Scheduler error types.

use thiserror::Error;

use crate::driver::DriverError;

/// Errors that escape the scheduler.
///
/// Per-offer conditions (too small, persistence failure) never show up
/// here; they are reported as declines in the `BatchReport`. What remains
/// is fatal for the process.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("cluster driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("state repository error: {0}")]
    State(#[from] fleet_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
