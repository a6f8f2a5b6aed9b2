//! Per-member vector clock: `AID → counter`, backed by a `BTreeMap` so serialisation
//! is always in sorted-key order without a separate canonicalisation
//! step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(BTreeMap<String, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aid: &str) -> u64 {
        *self.0.get(aid).unwrap_or(&0)
    }

    pub fn increment(&mut self, aid: &str) {
        *self.0.entry(aid.to_string()).or_insert(0) += 1;
    }

    /// Element-wise max merge.
    pub fn merge(&mut self, other: &VectorClock) {
        for (aid, counter) in &other.0 {
            let entry = self.0.entry(aid.clone()).or_insert(0);
            if *counter > *entry {
                *entry = *counter;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_is_per_aid() {
        let mut vc = VectorClock::new();
        vc.increment("alice");
        vc.increment("alice");
        vc.increment("bob");
        assert_eq!(vc.get("alice"), 2);
        assert_eq!(vc.get("bob"), 1);
        assert_eq!(vc.get("carol"), 0);
    }

    #[test]
    fn merge_takes_element_wise_max() {
        let mut a = VectorClock::new();
        a.increment("alice");
        a.increment("alice");
        let mut b = VectorClock::new();
        b.increment("alice");
        b.increment("bob");
        b.increment("bob");
        a.merge(&b);
        assert_eq!(a.get("alice"), 2);
        assert_eq!(a.get("bob"), 2);
    }

    #[test]
    fn serialization_is_deterministic_regardless_of_insertion_order() {
        let mut a = VectorClock::new();
        a.increment("bob");
        a.increment("alice");
        let mut b = VectorClock::new();
        b.increment("alice");
        b.increment("bob");
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }
}
