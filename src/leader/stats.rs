//! Periodic leader statistics. Reads snapshots only.

use crate::leader::state::LeaderState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberStats {
    pub id: String,
    pub messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderStats {
    /// Messages in the leader's own store
    pub local_messages: usize,
    pub indexed_messages: usize,
    /// Alive members with the number of messages the index attributes to each
    pub alive: Vec<MemberStats>,
    pub dead: Vec<String>,
}

/// Take a consistent-enough snapshot for reporting.
pub async fn collect(state: &LeaderState) -> LeaderStats {
    let local_messages = match state.store.count().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "could not count local messages");
            0
        }
    };
    let counts = state.index.replica_counts();
    let alive = state
        .directory
        .snapshot_alive()
        .into_iter()
        .map(|m| MemberStats {
            messages: counts.get(&m.id).copied().unwrap_or(0),
            id: m.id,
        })
        .collect();
    let dead = state
        .directory
        .snapshot_dead()
        .into_iter()
        .map(|m| m.id)
        .collect();

    LeaderStats {
        local_messages,
        indexed_messages: state.index.len(),
        alive,
        dead,
    }
}

/// Log [`collect`] every `interval` until the task is aborted.
pub fn start_stats_reporter(state: Arc<LeaderState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = collect(&state).await;
            tracing::info!(
                local = stats.local_messages,
                indexed = stats.indexed_messages,
                dead = ?stats.dead,
                "[STATS] leader holds {} messages",
                stats.local_messages
            );
            for member in &stats.alive {
                tracing::info!(member = %member.id, messages = member.messages, "[STATS] {}: {} messages", member.id, member.messages);
            }
        }
    })
}
