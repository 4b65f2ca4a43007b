//! SchedulerCore — the offer-processing control path.
//!
//! For every offer in a batch the core:
//! - computes remaining demand from the desired count and tracked tasks
//! - asks the matcher for descriptors that fit
//! - persists the descriptors, then issues exactly one launch for the offer
//! - or declines the offer when there is no demand, no fit, or the write failed
//!
//! Batches are serialised through the tracked-task mutex, so two offers can
//! never be allocated against the same stale demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fleet_core::{FrameworkId, Offer, OfferId, TaskDescriptor, TaskId, TaskRequirement, TaskState};
use fleet_state::StateRepository;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::driver::ClusterDriver;
use crate::error::SchedulerResult;
use crate::instance_count::InstanceCount;
use crate::matcher::OfferMatcher;

/// Why an offer was handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// Desired count already reached.
    NoDemand,
    /// Offer cannot hold even one instance.
    InsufficientResources,
    /// Descriptors could not be persisted, so nothing was launched.
    PersistenceFailure(String),
}

/// Terminal state of one offer within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferDecision {
    Launched { task_ids: Vec<TaskId> },
    Declined(DeclineReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferOutcome {
    pub offer_id: OfferId,
    pub decision: OfferDecision,
}

/// Per-offer outcomes of one `resource_offers` call, in offer order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<OfferOutcome>,
}

impl BatchReport {
    /// Total tasks launched across the batch.
    pub fn tasks_launched(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.decision {
                OfferDecision::Launched { task_ids } => task_ids.len(),
                OfferDecision::Declined(_) => 0,
            })
            .sum()
    }

    pub fn declined(&self) -> impl Iterator<Item = (&OfferId, &DeclineReason)> {
        self.outcomes.iter().filter_map(|o| match &o.decision {
            OfferDecision::Declined(reason) => Some((&o.offer_id, reason)),
            OfferDecision::Launched { .. } => None,
        })
    }

    /// Offers whose launch was aborted because persistence failed.
    pub fn persistence_failures(&self) -> usize {
        self.declined()
            .filter(|(_, r)| matches!(r, DeclineReason::PersistenceFailure(_)))
            .count()
    }
}

/// Orchestrates matching, persistence, and driver instructions.
pub struct SchedulerCore {
    requirement: TaskRequirement,
    instances: Arc<InstanceCount>,
    matcher: OfferMatcher,
    state: Arc<dyn StateRepository>,
    driver: Arc<dyn ClusterDriver>,
    /// Descriptors believed running: task_id → descriptor.
    tracked: Mutex<HashMap<TaskId, TaskDescriptor>>,
    framework_id: RwLock<Option<FrameworkId>>,
    /// Set once persisted state has been loaded into `tracked`.
    recovered: AtomicBool,
}

impl SchedulerCore {
    /// Create a scheduler.
    ///
    /// Persisted state is loaded by [`SchedulerCore::recover`], or lazily by
    /// the first batch or registration if the caller never recovers.
    pub fn new(
        requirement: TaskRequirement,
        instances: Arc<InstanceCount>,
        matcher: OfferMatcher,
        state: Arc<dyn StateRepository>,
        driver: Arc<dyn ClusterDriver>,
    ) -> Self {
        Self {
            requirement,
            instances,
            matcher,
            state,
            driver,
            tracked: Mutex::new(HashMap::new()),
            framework_id: RwLock::new(None),
            recovered: AtomicBool::new(false),
        }
    }

    /// Reload framework identity and tracked tasks from the repository.
    ///
    /// Returns the number of tracked tasks belonging to this requirement.
    pub async fn recover(&self) -> SchedulerResult<usize> {
        let framework_id = self.state.framework_id()?;
        let descriptors = self.state.all_task_infos()?;

        let mut tracked = self.tracked.lock().await;
        tracked.clear();
        for descriptor in descriptors {
            tracked.insert(descriptor.task_id.clone(), descriptor);
        }
        let running = self.count_running(&tracked);

        info!(
            framework_id = framework_id.as_ref().map(FrameworkId::as_str).unwrap_or("<none>"),
            tracked = tracked.len(),
            running,
            "scheduler state recovered"
        );
        *self.framework_id.write().await = framework_id;
        self.recovered.store(true, Ordering::Release);
        Ok(running)
    }

    /// Whether persisted state has been loaded.
    pub fn is_recovered(&self) -> bool {
        self.recovered.load(Ordering::Acquire)
    }

    async fn ensure_recovered(&self) -> SchedulerResult<()> {
        if !self.is_recovered() {
            warn!("scheduler used before recovery, recovering now");
            self.recover().await?;
        }
        Ok(())
    }

    /// Process one batch of offers, in order, issuing exactly one driver
    /// instruction per offer.
    ///
    /// Persistence failures decline the affected offer and show up in the
    /// report. A driver failure aborts the batch and is returned as an error.
    pub async fn resource_offers(&self, offers: &[Offer]) -> SchedulerResult<BatchReport> {
        self.ensure_recovered().await?;
        let mut tracked = self.tracked.lock().await;
        let desired = self.instances.get();
        let mut running = u32::try_from(self.count_running(&tracked)).unwrap_or(u32::MAX);
        let mut report = BatchReport::default();

        debug!(offers = offers.len(), desired, running, "processing offer batch");

        for offer in offers {
            let remaining = desired.saturating_sub(running);
            if remaining == 0 {
                self.decline(offer, DeclineReason::NoDemand, &mut report)?;
                continue;
            }

            let matched = self.matcher.match_offer(offer, &self.requirement, remaining);
            if matched.is_empty() {
                self.decline(offer, DeclineReason::InsufficientResources, &mut report)?;
                continue;
            }

            // Write before act: a crash after this point leaves a record to reconcile.
            if let Err(e) = self.state.store(&matched.descriptors) {
                error!(offer_id = %offer.id, error = %e, "failed to persist task descriptors, declining offer");
                self.decline(offer, DeclineReason::PersistenceFailure(e.to_string()), &mut report)?;
                continue;
            }

            let launched = matched.descriptors.len() as u32;
            for descriptor in &matched.descriptors {
                tracked.insert(descriptor.task_id.clone(), descriptor.clone());
            }
            running = running.saturating_add(launched);

            self.driver.launch_tasks(&offer.id, &matched.descriptors)?;

            info!(
                offer_id = %offer.id,
                tasks = launched,
                running,
                desired,
                "offer launched"
            );
            report.outcomes.push(OfferOutcome {
                offer_id: offer.id.clone(),
                decision: OfferDecision::Launched {
                    task_ids: matched.descriptors.iter().map(|d| d.task_id.clone()).collect(),
                },
            });
        }

        Ok(report)
    }

    /// Record the framework id handed out on (re-)registration and ask the
    /// driver to reconcile every tracked task.
    pub async fn registered(&self, framework_id: FrameworkId) -> SchedulerResult<()> {
        self.ensure_recovered().await?;
        if self.state.framework_id()?.as_ref() != Some(&framework_id) {
            self.state.set_framework_id(&framework_id)?;
            info!(%framework_id, "framework registered");
        } else {
            info!(%framework_id, "framework re-registered");
        }
        *self.framework_id.write().await = Some(framework_id);

        let task_ids: Vec<TaskId> = {
            let tracked = self.tracked.lock().await;
            tracked.keys().cloned().collect()
        };
        self.driver.reconcile_tasks(&task_ids)?;
        debug!(tasks = task_ids.len(), "reconciliation requested");
        Ok(())
    }

    /// Apply a task status update. Terminal states drop the task from the
    /// repository and the tracked set so a replacement can be launched.
    ///
    /// Returns whether a tracked task was removed.
    pub async fn status_update(&self, task_id: &TaskId, state: TaskState) -> SchedulerResult<bool> {
        if !state.is_terminal() {
            debug!(%task_id, ?state, "task status update");
            return Ok(false);
        }

        let mut tracked = self.tracked.lock().await;
        self.state.remove(task_id)?;
        let removed = tracked.remove(task_id).is_some();
        if removed {
            info!(%task_id, ?state, "task terminated");
        } else {
            warn!(%task_id, ?state, "terminal update for untracked task");
        }
        Ok(removed)
    }

    /// Tracked tasks rendered from this scheduler's requirement.
    pub async fn running_count(&self) -> usize {
        let tracked = self.tracked.lock().await;
        self.count_running(&tracked)
    }

    pub async fn framework_id(&self) -> Option<FrameworkId> {
        self.framework_id.read().await.clone()
    }

    pub fn instance_count(&self) -> &Arc<InstanceCount> {
        &self.instances
    }

    pub fn requirement(&self) -> &TaskRequirement {
        &self.requirement
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn count_running(&self, tracked: &HashMap<TaskId, TaskDescriptor>) -> usize {
        tracked
            .values()
            .filter(|d| d.name == self.requirement.name())
            .count()
    }

    fn decline(
        &self,
        offer: &Offer,
        reason: DeclineReason,
        report: &mut BatchReport,
    ) -> SchedulerResult<()> {
        self.driver.decline_offer(&offer.id)?;
        debug!(offer_id = %offer.id, ?reason, "offer declined");
        report.outcomes.push(OfferOutcome {
            offer_id: offer.id.clone(),
            decision: OfferDecision::Declined(reason),
        });
        Ok(())
    }
}
