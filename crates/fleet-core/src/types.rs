//! Domain types shared across Fleet crates.
//!
//! Offers arrive from the cluster resource manager, task requirements come
//! from configuration, and task descriptors are what the matcher produces
//! and the state repository persists.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};

/// Well-known scalar resource names.
pub const CPUS: &str = "cpus";
pub const MEM: &str = "mem";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque identifier the resource manager assigns to an offer.
    OfferId
);
string_id!(
    /// Unique identifier of a launched task.
    TaskId
);
string_id!(
    /// The scheduler's registration identity with the resource manager.
    FrameworkId
);

// ── Resources ─────────────────────────────────────────────────────

/// Named scalar resources (e.g. `cpus → 1.0`, `mem → 1024.0`).
///
/// Backed by a `BTreeMap` so iteration and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSet(BTreeMap<String, f64>);

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the common `cpus` + `mem` pair.
    pub fn cpus_mem(cpus: f64, mem: f64) -> Self {
        Self::new().with(CPUS, cpus).with(MEM, mem)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, amount: f64) -> Self {
        self.insert(name, amount);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, amount: f64) {
        self.0.insert(name.into(), amount);
    }

    /// Amount of `name`; an absent dimension counts as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every dimension multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|(k, v)| (k.clone(), v * factor)).collect())
    }

    /// Subtract `other` dimension-wise, clamping each result at zero.
    ///
    /// Dimensions only present in `other` are ignored.
    pub fn saturating_sub(&self, other: &ResourceSet) -> Self {
        Self(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), (v - other.get(k)).max(0.0)))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, f64); N]> for ResourceSet {
    fn from(pairs: [(&str, f64); N]) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

// ── Offer ─────────────────────────────────────────────────────────

/// A resource manager's proposal of resources on one agent.
///
/// Valid for exactly one matching decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    #[serde(default)]
    pub hostname: String,
    pub resources: ResourceSet,
}

impl Offer {
    pub fn new(id: impl Into<OfferId>, resources: ResourceSet) -> Self {
        Self {
            id: id.into(),
            hostname: String::new(),
            resources,
        }
    }
}

// ── Task requirement ──────────────────────────────────────────────

/// What one instance of the scheduled workload needs and how to run it.
///
/// Only constructible through [`TaskRequirement::new`] (or config loading),
/// which guarantees every resource amount is finite and positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRequirement {
    name: String,
    resources: ResourceSet,
    command: Option<String>,
    env: HashMap<String, String>,
}

impl TaskRequirement {
    pub fn new(name: impl Into<String>, resources: ResourceSet) -> ConfigResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if resources.is_empty() {
            return Err(ConfigError::NoResources { name });
        }
        for (resource, amount) in resources.iter() {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ConfigError::InvalidResource {
                    name,
                    resource: resource.to_string(),
                    amount,
                });
            }
        }
        Ok(Self {
            name,
            resources,
            command: None,
            env: HashMap::new(),
        })
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }
}

// ── Task descriptor ───────────────────────────────────────────────

/// One launchable task, packed into a specific offer.
///
/// Never mutated after creation. Carries its originating offer id so a
/// persisted record can be reconciled against the resource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    /// Name of the requirement this task was rendered from.
    pub name: String,
    pub offer_id: OfferId,
    #[serde(default)]
    pub hostname: String,
    pub resources: ResourceSet,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl TaskDescriptor {
    /// Render a descriptor for `requirement` inside `offer` with a fresh task id.
    pub fn for_offer(requirement: &TaskRequirement, offer: &Offer) -> Self {
        Self {
            task_id: TaskId::new(format!("{}.{}", requirement.name(), Uuid::new_v4())),
            name: requirement.name().to_string(),
            offer_id: offer.id.clone(),
            hostname: offer.hostname.clone(),
            resources: requirement.resources().clone(),
            command: requirement.command().map(str::to_string),
            env: requirement.env().clone(),
        }
    }
}

// ── Task state ────────────────────────────────────────────────────

/// Task lifecycle states as reported by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    /// Whether the task has stopped for good and no longer counts as running.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished
                | TaskState::Failed
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Error
        )
    }
}
