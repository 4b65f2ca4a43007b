//! Replay a recorded event stream through the scheduler core.
//!
//! Each non-empty line of the input is one JSON event:
//!
//! ```text
//! {"type":"registered","framework_id":"fw-1"}
//! {"type":"offers","offers":[{"id":"o-1","resources":{"cpus":1.0,"mem":1024.0}}]}
//! {"type":"status","task_id":"hello.…","state":"failed"}
//! {"type":"scale","instances":3}
//! ```
//!
//! Lines starting with `#` are ignored.

use std::io::BufRead;

use anyhow::Context;
use fleet_core::{FrameworkId, Offer, TaskId, TaskState};
use fleet_scheduler::SchedulerCore;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Registered { framework_id: FrameworkId },
    Offers { offers: Vec<Offer> },
    Status { task_id: TaskId, state: TaskState },
    /// Administrative change of the desired instance count.
    Scale { instances: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub batches: usize,
    pub tasks_launched: usize,
    pub offers_declined: usize,
    pub persistence_failures: usize,
    pub tasks_terminated: usize,
}

pub fn parse_event(line: &str) -> anyhow::Result<Option<ReplayEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let event = serde_json::from_str(line)?;
    Ok(Some(event))
}

pub async fn replay<R: BufRead>(core: &SchedulerCore, input: R) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;
        let Some(event) =
            parse_event(&line).with_context(|| format!("invalid event on line {lineno}"))?
        else {
            continue;
        };

        match event {
            ReplayEvent::Registered { framework_id } => {
                core.registered(framework_id).await?;
            }
            ReplayEvent::Offers { offers } => {
                let report = core.resource_offers(&offers).await?;
                summary.batches += 1;
                summary.tasks_launched += report.tasks_launched();
                summary.offers_declined += report.declined().count();
                summary.persistence_failures += report.persistence_failures();
                if report.persistence_failures() > 0 {
                    warn!(
                        lineno,
                        failures = report.persistence_failures(),
                        "batch had persistence failures"
                    );
                }
            }
            ReplayEvent::Status { task_id, state } => {
                if core.status_update(&task_id, state).await? {
                    summary.tasks_terminated += 1;
                }
            }
            ReplayEvent::Scale { instances } => {
                let previous = core.instance_count().set(instances);
                info!(from = previous, to = instances, "instance count changed");
            }
        }
    }

    Ok(summary)
}
