//! GET path
//!
//! Local copy first. On a local miss, the members recorded in the index are
//! tried one at a time, in recorded order, skipping any believed dead. The
//! first non-empty answer wins.

use crate::common::Result;
use crate::leader::directory::{Observation, ReplicaDescriptor};
use crate::leader::index::LEADER_SENTINEL;
use crate::leader::state::LeaderState;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Served from the leader's own store
    Local(String),
    /// Served by a member after `crashed` were found unreachable
    Replica {
        replica: String,
        text: String,
        crashed: Vec<String>,
    },
    NotFound { crashed: Vec<String> },
}

impl ReadOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            ReadOutcome::Local(text) | ReadOutcome::Replica { text, .. } => Some(text),
            ReadOutcome::NotFound { .. } => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            ReadOutcome::Local(text) | ReadOutcome::Replica { text, .. } => Some(text),
            ReadOutcome::NotFound { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct ReadCoordinator {
    state: Arc<LeaderState>,
}

impl ReadCoordinator {
    pub fn new(state: Arc<LeaderState>) -> Self {
        Self { state }
    }

    /// Look up `id`. Only a local read failure is an `Err`.
    pub async fn get(&self, id: i64) -> Result<ReadOutcome> {
        let state = &self.state;

        if let Some(text) = state.store.load(id).await? {
            return Ok(ReadOutcome::Local(text));
        }

        let candidates = self.alive_candidates(id);
        let mut crashed = Vec::new();

        for member in candidates {
            match state.client.retrieve(&member, id).await {
                Ok(text) => {
                    state.directory.observe(&member.id, Observation::Reachable);
                    if !text.is_empty() {
                        tracing::debug!(id, member = %member.id, "message served by member");
                        return Ok(ReadOutcome::Replica {
                            replica: member.id,
                            text,
                            crashed,
                        });
                    }
                    tracing::debug!(id, member = %member.id, "member does not hold message {}", id);
                }
                Err(err) => {
                    state
                        .directory
                        .observe(&member.id, Observation::Unreachable(err.to_string()));
                    tracing::warn!(
                        id,
                        member = %member.id,
                        error = %err,
                        "[GET FALLBACK] {} unreachable for message {}, trying next member",
                        member.id,
                        id
                    );
                    crashed.push(member.id);
                }
            }
        }

        Ok(ReadOutcome::NotFound { crashed })
    }

    /// Indexed members for `id` that are currently alive, in recorded order.
    fn alive_candidates(&self, id: i64) -> Vec<ReplicaDescriptor> {
        let mut candidates = Vec::new();
        for replica in self.state.index.replicas_for(id) {
            if replica == LEADER_SENTINEL {
                continue;
            }
            match self.state.directory.find(&replica) {
                Some(member) if member.is_alive() => candidates.push(member),
                Some(_) => {
                    tracing::info!(id, member = %replica, "skipping dead member {}", replica)
                }
                None => tracing::debug!(id, member = %replica, "indexed member is not registered"),
            }
        }
        candidates
    }
}
