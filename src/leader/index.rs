//! Message → replica index
//!
//! Records, per message id, the ordered members believed to hold a copy. The
//! leader's own copy is recorded under [`LEADER_SENTINEL`]. An id is only
//! present while its list is non-empty.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;

/// Index entry for the leader's own local copy
pub const LEADER_SENTINEL: &str = "leader";

#[derive(Debug, Default)]
pub struct MessageIndex {
    entries: DashMap<i64, Vec<String>>,
}

impl MessageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `replica` to the holders of `message_id` unless already recorded.
    pub fn record(&self, message_id: i64, replica: &str) {
        let mut holders = self.entries.entry(message_id).or_default();
        if !holders.iter().any(|r| r == replica) {
            holders.push(replica.to_string());
            tracing::debug!(message_id, replica, "index entry added");
        }
    }

    /// Forget that `replica` holds `message_id`. The leader's own entry is never removed.
    pub fn remove(&self, message_id: i64, replica: &str) -> bool {
        if replica == LEADER_SENTINEL {
            return false;
        }
        match self.entries.entry(message_id) {
            Entry::Occupied(mut entry) => {
                let holders = entry.get_mut();
                let before = holders.len();
                holders.retain(|r| r != replica);
                let removed = holders.len() != before;
                if holders.is_empty() {
                    entry.remove();
                }
                if removed {
                    tracing::debug!(message_id, replica, "index entry removed");
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Recorded holders in insertion order; empty when the id is unknown.
    pub fn replicas_for(&self, message_id: i64) -> Vec<String> {
        self.entries
            .get(&message_id)
            .map(|holders| holders.value().clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, message_id: i64, replica: &str) -> bool {
        self.entries
            .get(&message_id)
            .is_some_and(|holders| holders.iter().any(|r| r == replica))
    }

    pub fn count_for(&self, message_id: i64) -> usize {
        self.entries.get(&message_id).map_or(0, |holders| holders.len())
    }

    /// Number of messages attributed to each holder.
    pub fn replica_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for entry in self.entries.iter() {
            for replica in entry.value() {
                *counts.entry(replica.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Number of indexed messages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
