//! fleet.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{ResourceSet, TaskRequirement};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub framework: FrameworkConfig,
    pub task: TaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub name: String,
    pub role: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    /// Initial desired instance count.
    #[serde(default = "default_instances")]
    pub instances: u32,
    pub command: Option<String>,
    pub resources: BTreeMap<String, f64>,
    pub env: Option<HashMap<String, String>>,
}

fn default_instances() -> u32 {
    1
}

impl FrameworkConfig {
    /// Resource role the framework registers under; `*` when unset.
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or("*")
    }

    /// User tasks run as; empty means the agent's default user.
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or_default()
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: FleetConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        // Fail fast: a bad requirement must never reach offer processing.
        config.task_requirement()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build the validated per-instance requirement.
    pub fn task_requirement(&self) -> ConfigResult<TaskRequirement> {
        let mut resources = ResourceSet::new();
        for (name, amount) in &self.task.resources {
            resources.insert(name.clone(), *amount);
        }
        let mut requirement = TaskRequirement::new(self.task.name.clone(), resources)?;
        if let Some(command) = &self.task.command {
            requirement = requirement.with_command(command.clone());
        }
        if let Some(env) = &self.task.env {
            requirement = requirement.with_env(env.clone());
        }
        Ok(requirement)
    }
}
