//! fleet-core — shared types for the Fleet framework scheduler.
//!
//! Holds the data model exchanged between the cluster driver, the offer
//! matcher, and the state repository, plus the `fleet.toml` parser that
//! produces the scheduler's `TaskRequirement`.

pub mod config;
pub mod error;
pub mod types;

pub use config::FleetConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
