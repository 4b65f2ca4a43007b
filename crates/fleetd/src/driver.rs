//! Driver that writes every instruction as a JSON line.
//!
//! Stands in for the resource-manager transport during replays: the
//! instructions land on stdout (or any writer) where they can be diffed.

use std::io::Write;
use std::sync::Mutex;

use fleet_core::{OfferId, TaskDescriptor, TaskId};
use fleet_scheduler::{ClusterDriver, DriverError};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Instruction<'a> {
    Launch {
        offer_id: &'a OfferId,
        tasks: &'a [TaskDescriptor],
    },
    Decline {
        offer_id: &'a OfferId,
    },
    Reconcile {
        tasks: &'a [TaskId],
    },
}

pub struct LoggingDriver<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> LoggingDriver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, instruction: &Instruction<'_>) -> Result<(), DriverError> {
        let line = serde_json::to_string(instruction)
            .map_err(|e| DriverError::Rejected(e.to_string()))?;
        let mut out = self
            .out
            .lock()
            .map_err(|e| DriverError::Disconnected(e.to_string()))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> ClusterDriver for LoggingDriver<W> {
    fn launch_tasks(&self, offer_id: &OfferId, tasks: &[TaskDescriptor]) -> Result<(), DriverError> {
        info!(%offer_id, tasks = tasks.len(), "launch");
        self.emit(&Instruction::Launch { offer_id, tasks })
    }

    fn decline_offer(&self, offer_id: &OfferId) -> Result<(), DriverError> {
        info!(%offer_id, "decline");
        self.emit(&Instruction::Decline { offer_id })
    }

    fn reconcile_tasks(&self, tasks: &[TaskId]) -> Result<(), DriverError> {
        info!(tasks = tasks.len(), "reconcile");
        self.emit(&Instruction::Reconcile { tasks })
    }
}
