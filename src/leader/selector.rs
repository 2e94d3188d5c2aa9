//! Replica selection for writes
//!
//! Picks up to `count` alive members for one message. Asking for more members
//! than are alive returns all of them: degraded redundancy beats refusing the
//! write.

use crate::leader::directory::{ReplicaDescriptor, ReplicaDirectory};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Load-balancing policy, fixed for the lifetime of a leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectionPolicy {
    RoundRobin,
    HashBased,
    /// Used for any unrecognized configuration value
    Random,
}

impl From<&str> for SelectionPolicy {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" | "rr" => SelectionPolicy::RoundRobin,
            "hash" | "hash-based" | "hash_based" | "hashbased" => SelectionPolicy::HashBased,
            "random" => SelectionPolicy::Random,
            other => {
                tracing::warn!("unknown selection policy {:?}, falling back to random", other);
                SelectionPolicy::Random
            }
        }
    }
}

impl From<String> for SelectionPolicy {
    fn from(s: String) -> Self {
        SelectionPolicy::from(s.as_str())
    }
}

impl From<SelectionPolicy> for String {
    fn from(p: SelectionPolicy) -> String {
        p.to_string()
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::RoundRobin => write!(f, "round-robin"),
            SelectionPolicy::HashBased => write!(f, "hash-based"),
            SelectionPolicy::Random => write!(f, "random"),
        }
    }
}

pub struct ReplicaSelector {
    policy: SelectionPolicy,
    /// Round-robin cursor, always kept below the alive-set size it was last advanced against
    counter: AtomicUsize,
}

impl ReplicaSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Select members for `message_id` from the directory's current alive set.
    pub fn select(
        &self,
        directory: &ReplicaDirectory,
        count: usize,
        message_id: i64,
    ) -> Vec<ReplicaDescriptor> {
        self.select_from(&directory.snapshot_alive(), count, message_id)
    }

    /// Select from an explicit alive list. Result length is `min(count, alive.len())`.
    pub fn select_from(
        &self,
        alive: &[ReplicaDescriptor],
        count: usize,
        message_id: i64,
    ) -> Vec<ReplicaDescriptor> {
        if alive.is_empty() || count == 0 {
            return Vec::new();
        }
        let count = count.min(alive.len());

        let selected = match self.policy {
            SelectionPolicy::RoundRobin => {
                let start = self.advance(count, alive.len());
                circular(alive, start, count)
            }
            SelectionPolicy::HashBased => circular(alive, hash_start(message_id, alive.len()), count),
            SelectionPolicy::Random => alive
                .choose_multiple(&mut rand::thread_rng(), count)
                .cloned()
                .collect(),
        };

        tracing::debug!(
            message_id,
            policy = %self.policy,
            selected = ?selected.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            "replicas selected"
        );
        selected
    }

    /// Claim a start index and advance the cursor by `count`, atomically.
    fn advance(&self, count: usize, len: usize) -> usize {
        let mut start = 0;
        let _ = self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                start = current % len;
                Some((start + count) % len)
            });
        start
    }
}

/// `|message_id mod len|`
pub fn hash_start(message_id: i64, len: usize) -> usize {
    (message_id % len as i64).unsigned_abs() as usize
}

fn circular(alive: &[ReplicaDescriptor], start: usize, count: usize) -> Vec<ReplicaDescriptor> {
    (0..count)
        .map(|i| alive[(start + i) % alive.len()].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn members(n: usize) -> Vec<ReplicaDescriptor> {
        (1..=n)
            .map(|i| ReplicaDescriptor::new(format!("m{}", i), "localhost", 9090 + i as u16))
            .collect()
    }

    fn ids(list: &[ReplicaDescriptor]) -> Vec<&str> {
        list.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_hash_based_example() {
        let selector = ReplicaSelector::new(SelectionPolicy::HashBased);
        let alive = members(3);
        // 5 mod 3 = 2 -> m3, then wrap to m1
        assert_eq!(ids(&selector.select_from(&alive, 2, 5)), vec!["m3", "m1"]);
    }

    #[test]
    fn test_hash_based_is_pure() {
        let selector = ReplicaSelector::new(SelectionPolicy::HashBased);
        let alive = members(5);
        for id in [-17i64, 0, 3, 42, i64::MAX, i64::MIN] {
            let first = selector.select_from(&alive, 3, id);
            for _ in 0..5 {
                assert_eq!(ids(&selector.select_from(&alive, 3, id)), ids(&first));
            }
        }
    }

    #[test]
    fn test_hash_start_non_negative() {
        assert_eq!(hash_start(-5, 3), 2);
        assert_eq!(hash_start(-3, 3), 0);
        assert_eq!(hash_start(i64::MIN, 7), (i64::MIN % 7).unsigned_abs() as usize);
    }

    #[test]
    fn test_round_robin_visits_each_once_per_cycle() {
        let selector = ReplicaSelector::new(SelectionPolicy::RoundRobin);
        let alive = members(4);
        let visited: Vec<String> = (0..8)
            .map(|i| selector.select_from(&alive, 1, i)[0].id.clone())
            .collect();
        assert_eq!(visited, vec!["m1", "m2", "m3", "m4", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_round_robin_advances_by_count() {
        let selector = ReplicaSelector::new(SelectionPolicy::RoundRobin);
        let alive = members(3);
        assert_eq!(ids(&selector.select_from(&alive, 2, 0)), vec!["m1", "m2"]);
        assert_eq!(ids(&selector.select_from(&alive, 2, 0)), vec!["m3", "m1"]);
        assert_eq!(ids(&selector.select_from(&alive, 2, 0)), vec!["m2", "m3"]);
    }

    #[test]
    fn test_count_is_capped_by_alive() {
        for policy in [
            SelectionPolicy::RoundRobin,
            SelectionPolicy::HashBased,
            SelectionPolicy::Random,
        ] {
            let selector = ReplicaSelector::new(policy);
            let picked = selector.select_from(&members(2), 7, 9);
            assert_eq!(picked.len(), 2);
            let unique: HashSet<_> = picked.iter().map(|m| m.id.clone()).collect();
            assert_eq!(unique.len(), 2);
        }
    }

    #[test]
    fn test_empty_cases() {
        let selector = ReplicaSelector::new(SelectionPolicy::HashBased);
        assert!(selector.select_from(&[], 3, 1).is_empty());
        assert!(selector.select_from(&members(3), 0, 1).is_empty());
    }

    #[test]
    fn test_select_skips_dead_members() {
        let directory = ReplicaDirectory::new();
        directory.register("m1", "localhost", 9091);
        directory.register("m2", "localhost", 9092);
        directory.register("m3", "localhost", 9093);
        directory.mark_dead("m2", "timeout");

        let selector = ReplicaSelector::new(SelectionPolicy::HashBased);
        let picked = selector.select(&directory, 3, 1);
        assert_eq!(ids(&picked), vec!["m3", "m1"]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(SelectionPolicy::from("round-robin"), SelectionPolicy::RoundRobin);
        assert_eq!(SelectionPolicy::from("ROUND_ROBIN"), SelectionPolicy::RoundRobin);
        assert_eq!(SelectionPolicy::from("hash"), SelectionPolicy::HashBased);
        assert_eq!(SelectionPolicy::from("least-loaded"), SelectionPolicy::Random);
    }

    #[test]
    fn test_concurrent_round_robin_claims_distinct_starts() {
        let selector = Arc::new(ReplicaSelector::new(SelectionPolicy::RoundRobin));
        let alive = Arc::new(members(1000));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let selector = selector.clone();
                let alive = alive.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| selector.select_from(&alive, 1, 0)[0].id.clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "two selections shared a start index");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
