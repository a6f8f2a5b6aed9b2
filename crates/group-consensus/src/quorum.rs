//! Pure quorum arithmetic, kept free of storage so it can
//! be property-tested in isolation.

use std::collections::BTreeMap;

pub fn required_votes(member_count: usize, threshold: f64) -> usize {
    if threshold == 0.5 {
        member_count / 2 + 1
    } else {
        (member_count as f64 * threshold).ceil() as usize
    }
}

pub fn has_quorum(votes: &BTreeMap<String, bool>, member_count: usize, threshold: f64) -> bool {
    let required = required_votes(member_count, threshold);
    let yes = votes.values().filter(|v| **v).count();
    yes >= required
}
