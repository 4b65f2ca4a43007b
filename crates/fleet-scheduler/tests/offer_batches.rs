//! Offer batch regression tests.
//!
//! Drives `SchedulerCore` with recording and fault-injecting doubles and
//! checks the shape of every driver instruction.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use fleet_core::*;
use fleet_scheduler::*;
use fleet_state::{MemoryStateRepository, RedbStateRepository, StateError, StateRepository, StateResult};

// ── Doubles ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Launch {
        offer_ids: Vec<OfferId>,
        tasks: Vec<TaskDescriptor>,
    },
    Decline(OfferId),
    Reconcile(Vec<TaskId>),
}

/// Records every instruction in order.
#[derive(Default)]
struct RecordingDriver {
    calls: Mutex<Vec<Call>>,
}

impl RecordingDriver {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn launches(&self) -> Vec<(Vec<OfferId>, Vec<TaskDescriptor>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Launch { offer_ids, tasks } => Some((offer_ids, tasks)),
                _ => None,
            })
            .collect()
    }

    fn declines(&self) -> Vec<OfferId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Decline(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl ClusterDriver for RecordingDriver {
    fn launch_tasks(&self, offer_id: &OfferId, tasks: &[TaskDescriptor]) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(Call::Launch {
            offer_ids: vec![offer_id.clone()],
            tasks: tasks.to_vec(),
        });
        Ok(())
    }

    fn decline_offer(&self, offer_id: &OfferId) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(Call::Decline(offer_id.clone()));
        Ok(())
    }

    fn reconcile_tasks(&self, tasks: &[TaskId]) -> Result<(), DriverError> {
        self.calls.lock().unwrap().push(Call::Reconcile(tasks.to_vec()));
        Ok(())
    }
}

/// Wraps a repository and fails `store` for descriptors packed into the
/// listed offers.
struct FlakyRepository {
    inner: MemoryStateRepository,
    failing_offers: HashSet<OfferId>,
}

impl FlakyRepository {
    fn failing(offers: &[&str]) -> Self {
        Self {
            inner: MemoryStateRepository::new(),
            failing_offers: offers.iter().map(|o| OfferId::from(*o)).collect(),
        }
    }
}

impl StateRepository for FlakyRepository {
    fn framework_id(&self) -> StateResult<Option<FrameworkId>> {
        self.inner.framework_id()
    }

    fn set_framework_id(&self, id: &FrameworkId) -> StateResult<()> {
        self.inner.set_framework_id(id)
    }

    fn store(&self, descriptors: &[TaskDescriptor]) -> StateResult<()> {
        if descriptors
            .iter()
            .any(|d| self.failing_offers.contains(&d.offer_id))
        {
            return Err(StateError::Write("injected write failure".to_string()));
        }
        self.inner.store(descriptors)
    }

    fn remove(&self, task_id: &TaskId) -> StateResult<bool> {
        self.inner.remove(task_id)
    }

    fn all_task_infos(&self) -> StateResult<Vec<TaskDescriptor>> {
        self.inner.all_task_infos()
    }
}

/// Fails on launch after capturing what the repository held at that moment.
struct CrashingDriver {
    state: Arc<dyn StateRepository>,
    seen_at_launch: Mutex<Option<Vec<TaskDescriptor>>>,
}

impl ClusterDriver for CrashingDriver {
    fn launch_tasks(&self, _: &OfferId, _: &[TaskDescriptor]) -> Result<(), DriverError> {
        let persisted = self
            .state
            .all_task_infos()
            .map_err(|e| DriverError::Rejected(e.to_string()))?;
        *self.seen_at_launch.lock().unwrap() = Some(persisted);
        Err(DriverError::Disconnected("connection reset".to_string()))
    }

    fn decline_offer(&self, _: &OfferId) -> Result<(), DriverError> {
        Ok(())
    }

    fn reconcile_tasks(&self, _: &[TaskId]) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Bumps the desired count the first time it launches anything.
struct ScalingDriver {
    inner: RecordingDriver,
    instances: Arc<InstanceCount>,
    scale_to: u32,
}

impl ClusterDriver for ScalingDriver {
    fn launch_tasks(&self, offer_id: &OfferId, tasks: &[TaskDescriptor]) -> Result<(), DriverError> {
        self.instances.set(self.scale_to);
        self.inner.launch_tasks(offer_id, tasks)
    }

    fn decline_offer(&self, offer_id: &OfferId) -> Result<(), DriverError> {
        self.inner.decline_offer(offer_id)
    }

    fn reconcile_tasks(&self, tasks: &[TaskId]) -> Result<(), DriverError> {
        self.inner.reconcile_tasks(tasks)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn requirement() -> TaskRequirement {
    TaskRequirement::new("hello", ResourceSet::cpus_mem(1.0, 1024.0)).unwrap()
}

fn offer(id: &str, cpus: f64, mem: f64) -> Offer {
    Offer::new(id, ResourceSet::cpus_mem(cpus, mem))
}

struct Harness {
    core: SchedulerCore,
    state: Arc<dyn StateRepository>,
    driver: Arc<RecordingDriver>,
    instances: Arc<InstanceCount>,
}

fn harness_with(desired: u32, state: Arc<dyn StateRepository>) -> Harness {
    let driver = Arc::new(RecordingDriver::default());
    let instances = Arc::new(InstanceCount::new(desired));
    let core = SchedulerCore::new(
        requirement(),
        instances.clone(),
        OfferMatcher::new(),
        state.clone(),
        driver.clone(),
    );
    Harness {
        core,
        state,
        driver,
        instances,
    }
}

fn harness(desired: u32) -> Harness {
    harness_with(desired, Arc::new(MemoryStateRepository::new()))
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn will_launch_task_from_offer() {
    let h = harness(1);

    h.core
        .resource_offers(&[offer("ID 1", 1.0, 1024.0)])
        .await
        .unwrap();

    let launches = h.driver.launches();
    assert_eq!(launches.len(), 1);
    let (offer_ids, tasks) = &launches[0];
    assert_eq!(offer_ids.len(), 1);
    assert_eq!(offer_ids[0].as_str(), "ID 1");
    assert_eq!(tasks.len(), 1);
    assert!(h.driver.declines().is_empty());
}

#[tokio::test]
async fn scale_out_beyond_offer_capacity_launches_what_fits() {
    let h = harness(2);

    h.core
        .resource_offers(&[offer("ID 1", 1.0, 1024.0)])
        .await
        .unwrap();

    let launches = h.driver.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].0[0].as_str(), "ID 1");
    assert_eq!(launches[0].1.len(), 1);

    // One instance still pending: the next suitable offer gets it.
    h.core
        .resource_offers(&[offer("ID 2", 1.0, 1024.0)])
        .await
        .unwrap();
    assert_eq!(h.driver.launches().len(), 2);
    assert_eq!(h.core.running_count().await, 2);
}

#[tokio::test]
async fn oversized_offer_is_bounded_by_demand() {
    let h = harness(5);

    let report = h
        .core
        .resource_offers(&[offer("ID 1", 4.0, 4096.0)])
        .await
        .unwrap();

    let launches = h.driver.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].1.len(), 4);
    assert_eq!(report.tasks_launched(), 4);
}

#[tokio::test]
async fn launch_count_is_min_of_fit_and_demand() {
    for (cpus, desired, expected) in [(4.0, 2, 2), (3.0, 3, 3), (2.0, 7, 2), (8.0, 1, 1)] {
        let h = harness(desired);
        h.core
            .resource_offers(&[offer("o", cpus, cpus * 1024.0)])
            .await
            .unwrap();
        let launches = h.driver.launches();
        assert_eq!(launches.len(), 1, "cpus={cpus} desired={desired}");
        assert_eq!(launches[0].1.len(), expected, "cpus={cpus} desired={desired}");
    }
}

#[tokio::test]
async fn no_demand_declines_every_offer() {
    let h = harness(0);

    let report = h
        .core
        .resource_offers(&[
            offer("a", 1.0, 1024.0),
            offer("b", 64.0, 65536.0),
            offer("c", 0.1, 1.0),
        ])
        .await
        .unwrap();

    assert!(h.driver.launches().is_empty());
    assert_eq!(h.driver.declines().len(), 3);
    assert!(report
        .declined()
        .all(|(_, r)| *r == DeclineReason::NoDemand));
    assert!(h.state.all_task_infos().unwrap().is_empty());
}

#[tokio::test]
async fn undersized_offer_is_declined_without_persisting() {
    let h = harness(3);

    let report = h
        .core
        .resource_offers(&[offer("small", 0.5, 4096.0)])
        .await
        .unwrap();

    assert!(h.driver.launches().is_empty());
    assert_eq!(h.driver.declines(), vec![OfferId::from("small")]);
    assert_eq!(
        report.outcomes[0].decision,
        OfferDecision::Declined(DeclineReason::InsufficientResources)
    );
    assert!(h.state.all_task_infos().unwrap().is_empty());
}

#[tokio::test]
async fn one_instruction_per_offer_in_order() {
    let h = harness(3);

    h.core
        .resource_offers(&[
            offer("a", 2.0, 2048.0),
            offer("b", 0.5, 512.0),
            offer("c", 4.0, 4096.0),
            offer("d", 4.0, 4096.0),
        ])
        .await
        .unwrap();

    let calls = h.driver.calls();
    assert_eq!(calls.len(), 4);
    match &calls[0] {
        Call::Launch { offer_ids, tasks } => {
            assert_eq!(offer_ids, &vec![OfferId::from("a")]);
            assert_eq!(tasks.len(), 2);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls[1], Call::Decline(OfferId::from("b")));
    match &calls[2] {
        Call::Launch { offer_ids, tasks } => {
            assert_eq!(offer_ids, &vec![OfferId::from("c")]);
            // Only one instance left after "a".
            assert_eq!(tasks.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls[3], Call::Decline(OfferId::from("d")));
}

#[tokio::test]
async fn launched_descriptors_belong_to_their_offer() {
    let h = harness(4);

    h.core
        .resource_offers(&[offer("a", 2.0, 2048.0), offer("b", 2.0, 2048.0)])
        .await
        .unwrap();

    for (offer_ids, tasks) in h.driver.launches() {
        assert!(tasks.iter().all(|t| t.offer_id == offer_ids[0]));
    }
    let persisted = h.state.all_task_infos().unwrap();
    assert_eq!(persisted.len(), 4);
}

#[tokio::test]
async fn persistence_failure_declines_offer_and_batch_continues() {
    let state: Arc<dyn StateRepository> = Arc::new(FlakyRepository::failing(&["bad"]));
    let h = harness_with(2, state);

    let report = h
        .core
        .resource_offers(&[offer("bad", 1.0, 1024.0), offer("good", 1.0, 1024.0)])
        .await
        .unwrap();

    assert_eq!(h.driver.declines(), vec![OfferId::from("bad")]);
    let launches = h.driver.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].0[0].as_str(), "good");
    assert_eq!(report.persistence_failures(), 1);
    assert!(matches!(
        report.outcomes[0].decision,
        OfferDecision::Declined(DeclineReason::PersistenceFailure(_))
    ));
    // The failed offer did not consume demand.
    assert_eq!(h.core.running_count().await, 1);
}

#[tokio::test]
async fn descriptors_are_persisted_before_launch() {
    let state: Arc<dyn StateRepository> = Arc::new(MemoryStateRepository::new());
    let driver = Arc::new(CrashingDriver {
        state: state.clone(),
        seen_at_launch: Mutex::new(None),
    });
    let core = SchedulerCore::new(
        requirement(),
        Arc::new(InstanceCount::new(2)),
        OfferMatcher::new(),
        state.clone(),
        driver.clone(),
    );

    let result = core.resource_offers(&[offer("ID 1", 2.0, 2048.0)]).await;

    assert!(matches!(result, Err(SchedulerError::Driver(_))));
    let seen = driver.seen_at_launch.lock().unwrap().clone().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|d| d.offer_id.as_str() == "ID 1"));
    // Still on record for reconciliation after the "crash".
    assert_eq!(state.all_task_infos().unwrap().len(), 2);
}

#[tokio::test]
async fn driver_failure_aborts_remaining_offers() {
    struct DeclineFails;
    impl ClusterDriver for DeclineFails {
        fn launch_tasks(&self, _: &OfferId, _: &[TaskDescriptor]) -> Result<(), DriverError> {
            Ok(())
        }
        fn decline_offer(&self, _: &OfferId) -> Result<(), DriverError> {
            Err(DriverError::Disconnected("gone".to_string()))
        }
        fn reconcile_tasks(&self, _: &[TaskId]) -> Result<(), DriverError> {
            Ok(())
        }
    }

    let state = Arc::new(MemoryStateRepository::new());
    let core = SchedulerCore::new(
        requirement(),
        Arc::new(InstanceCount::new(1)),
        OfferMatcher::new(),
        state.clone(),
        Arc::new(DeclineFails),
    );

    let result = core
        .resource_offers(&[offer("small", 0.1, 1.0), offer("fits", 1.0, 1024.0)])
        .await;

    assert!(matches!(result, Err(SchedulerError::Driver(DriverError::Disconnected(_)))));
    assert!(state.is_empty());
}

#[tokio::test]
async fn instance_count_change_is_seen_by_next_batch_only() {
    let instances = Arc::new(InstanceCount::new(1));
    let driver = Arc::new(ScalingDriver {
        inner: RecordingDriver::default(),
        instances: instances.clone(),
        scale_to: 3,
    });
    let core = SchedulerCore::new(
        requirement(),
        instances.clone(),
        OfferMatcher::new(),
        Arc::new(MemoryStateRepository::new()),
        driver.clone(),
    );

    let first = core
        .resource_offers(&[offer("a", 1.0, 1024.0), offer("b", 1.0, 1024.0)])
        .await
        .unwrap();
    assert_eq!(first.tasks_launched(), 1);
    assert_eq!(driver.inner.declines(), vec![OfferId::from("b")]);

    let second = core
        .resource_offers(&[offer("c", 4.0, 4096.0)])
        .await
        .unwrap();
    assert_eq!(second.tasks_launched(), 2);
}

#[tokio::test]
async fn admin_scale_up_between_batches() {
    let h = harness(1);
    h.core
        .resource_offers(&[offer("a", 4.0, 4096.0)])
        .await
        .unwrap();
    assert_eq!(h.core.running_count().await, 1);

    h.instances.set(4);
    let report = h
        .core
        .resource_offers(&[offer("b", 4.0, 4096.0)])
        .await
        .unwrap();
    assert_eq!(report.tasks_launched(), 3);
    assert_eq!(h.core.running_count().await, 4);
}

// ── Restart / recovery ──────────────────────────────────────────────

#[tokio::test]
async fn restarted_scheduler_does_not_relaunch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.redb");

    {
        let state: Arc<dyn StateRepository> = Arc::new(RedbStateRepository::open(&path).unwrap());
        let h = harness_with(2, state);
        h.core.recover().await.unwrap();
        h.core.registered(FrameworkId::new("fw-1")).await.unwrap();
        h.core
            .resource_offers(&[offer("a", 2.0, 2048.0)])
            .await
            .unwrap();
        assert_eq!(h.driver.launches().len(), 1);
    }

    let state: Arc<dyn StateRepository> = Arc::new(RedbStateRepository::open(&path).unwrap());
    let h = harness_with(2, state);
    assert_eq!(h.core.recover().await.unwrap(), 2);
    assert_eq!(h.core.framework_id().await, Some(FrameworkId::new("fw-1")));

    h.core.registered(FrameworkId::new("fw-1")).await.unwrap();
    h.core
        .resource_offers(&[offer("b", 2.0, 2048.0)])
        .await
        .unwrap();

    assert!(h.driver.launches().is_empty());
    assert_eq!(h.driver.declines(), vec![OfferId::from("b")]);
    let reconciled: Vec<_> = h
        .driver
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Reconcile(ids) => Some(ids),
            _ => None,
        })
        .collect();
    assert_eq!(reconciled.len(), 1);
    assert_eq!(reconciled[0].len(), 2);
}
