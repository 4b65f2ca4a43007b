//! Desired instance count.
//!
//! Owned by whoever wires the scheduler together and shared through an
//! `Arc`. An administrative path may call [`InstanceCount::set`] at any
//! time; the scheduler reads one snapshot per offer batch.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free cell holding the desired number of running instances.
#[derive(Debug)]
pub struct InstanceCount {
    count: AtomicU32,
}

impl InstanceCount {
    pub fn new(count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
        }
    }

    /// Snapshot of the current desired count.
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Replace the desired count, returning the previous value.
    pub fn set(&self, count: u32) -> u32 {
        self.count.swap(count, Ordering::AcqRel)
    }
}

impl Default for InstanceCount {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn set_returns_previous() {
        let count = InstanceCount::new(1);
        assert_eq!(count.set(5), 1);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn default_is_one() {
        assert_eq!(InstanceCount::default().get(), 1);
    }

    #[test]
    fn concurrent_writers_leave_a_written_value() {
        let count = Arc::new(InstanceCount::new(0));
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let count = count.clone();
                std::thread::spawn(move || {
                    count.set(n);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let value = count.get();
        assert!((1..=8).contains(&value));
    }
}
