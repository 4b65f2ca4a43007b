//! fleet-scheduler — turns resource offers into task launches.
//!
//! The cluster driver delivers offer batches to [`SchedulerCore`]. For each
//! offer the core asks the [`OfferMatcher`] how many instances fit, persists
//! the resulting descriptors through the `StateRepository`, and only then
//! tells the driver to launch them. Offers that are not needed, or too
//! small, are declined.
//!
//! # Architecture
//!
//! ```text
//! ClusterDriver ──resource_offers──▶ SchedulerCore
//!                                      ├── InstanceCount (desired, snapshot per batch)
//!                                      ├── OfferMatcher  (pure packing decision)
//!                                      ├── StateRepository (store before launch)
//!                                      └── ClusterDriver  (launch / decline / reconcile)
//! ```

pub mod driver;
pub mod error;
pub mod instance_count;
pub mod matcher;
pub mod scheduler;

pub use driver::{ClusterDriver, DriverError};
pub use error::{SchedulerError, SchedulerResult};
pub use instance_count::InstanceCount;
pub use matcher::{MatchResult, OfferMatcher};
pub use scheduler::{BatchReport, DeclineReason, OfferDecision, OfferOutcome, SchedulerCore};
