//! Offer matcher — how many instances fit into one offer.
//!
//! Pure decision: no persistence, no driver calls. Packing is greedy over
//! whole instances: for every resource the requirement names, take
//! `floor(offered / required)`, then the minimum across resources, then
//! the minimum with the remaining demand.

use fleet_core::{Offer, ResourceSet, TaskDescriptor, TaskRequirement};
use tracing::debug;

/// Absorbs float noise in the per-dimension ratio (e.g. `0.3 / 0.1`).
const FIT_EPSILON: f64 = 1e-9;

/// Relative slack, in ULPs, allowed when checking `count * needed <= available`.
const FIT_ULPS: f64 = 4.0;

/// Descriptors packed into an offer, plus what the offer has left.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub descriptors: Vec<TaskDescriptor>,
    /// Offered resources not consumed by `descriptors`. Never negative.
    pub remainder: ResourceSet,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OfferMatcher;

impl OfferMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Pack up to `remaining` instances of `requirement` into `offer`.
    pub fn match_offer(
        &self,
        offer: &Offer,
        requirement: &TaskRequirement,
        remaining: u32,
    ) -> MatchResult {
        let fits = instances_fitting(&offer.resources, requirement.resources());
        let count = fits.min(remaining);

        let descriptors: Vec<TaskDescriptor> = (0..count)
            .map(|_| TaskDescriptor::for_offer(requirement, offer))
            .collect();
        let remainder = offer
            .resources
            .saturating_sub(&requirement.resources().scaled(f64::from(count)));

        debug!(
            offer_id = %offer.id,
            fits,
            remaining,
            packed = count,
            ?remainder,
            "offer matched"
        );

        MatchResult {
            descriptors,
            remainder,
        }
    }
}

/// Whole instances of `required` that `offered` can hold.
///
/// A required dimension missing from the offer counts as zero available.
/// `required` amounts are positive (enforced by `TaskRequirement`).
pub fn instances_fitting(offered: &ResourceSet, required: &ResourceSet) -> u32 {
    let mut fits = u32::MAX;
    for (name, needed) in required.iter() {
        let available = offered.get(name);
        if available <= 0.0 || needed <= 0.0 {
            return 0;
        }
        let ratio = (available / needed + FIT_EPSILON).floor();
        let mut whole = if ratio >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            ratio as u32
        };
        // The tolerance may round the ratio up past what the offer really holds.
        let ceiling = available * (1.0 + FIT_ULPS * f64::EPSILON);
        while whole > 0 && f64::from(whole) * needed > ceiling {
            whole -= 1;
        }
        fits = fits.min(whole);
    }
    if required.is_empty() { 0 } else { fits }
}
