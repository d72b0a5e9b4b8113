//! Candidate ordering
//!
//! Cheapest policy first; on equal cost, the policy with fewer
//! service-level scaling actions wins. The sort is stable, so policies equal
//! on both keys keep their input order.

use crate::models::Policy;
use std::cmp::Ordering;

/// Order two evaluated policies by cost, then by container scaling actions
pub fn compare(a: &Policy, b: &Policy) -> Ordering {
    a.metrics
        .cost
        .total_cmp(&b.metrics.cost)
        .then_with(|| {
            a.metrics
                .number_container_scaling_actions
                .cmp(&b.metrics.number_container_scaling_actions)
        })
}

/// Sort evaluated policies best first
pub fn rank(mut policies: Vec<Policy>) -> Vec<Policy> {
    policies.sort_by(compare);
    policies
}
