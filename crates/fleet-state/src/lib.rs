//! fleet-state — durable record of what the scheduler has launched.
//!
//! The scheduler depends only on the [`StateRepository`] capability. Two
//! implementations ship here:
//!
//! - [`MemoryStateRepository`] — process-local maps, for tests and dry runs
//! - [`RedbStateRepository`] — [redb](https://docs.rs/redb) backed, on disk
//!   or in memory
//!
//! Task descriptors are keyed by task id, so storing the same descriptor
//! twice is a no-op. The framework id lives under a single fixed key.

pub mod error;
pub mod memory;
pub mod repository;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use memory::MemoryStateRepository;
pub use repository::StateRepository;
pub use store::RedbStateRepository;
