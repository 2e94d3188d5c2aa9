//! SET path
//!
//! Local save first, then a parallel fan-out to the selected members. A write
//! is reported successful only when every selected member acknowledged it;
//! whatever was stored before a failure stays stored and indexed.

use crate::common::{Error, Result};
use crate::leader::directory::Observation;
use crate::leader::index::LEADER_SENTINEL;
use crate::leader::member_client::RpcError;
use crate::leader::state::LeaderState;
use futures_util::future::join_all;
use std::sync::Arc;

/// What happened to one SET, member ids in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub selected: Vec<String>,
    pub stored: Vec<String>,
    /// Members that answered but refused the write
    pub refused: Vec<String>,
    /// Members that failed at the transport level and are now marked dead
    pub crashed: Vec<String>,
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.stored.len() == self.selected.len()
    }

    /// `Err(PartialReplication)` unless every selected member stored the message.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(Error::PartialReplication {
                stored: self.stored.len(),
                selected: self.selected.len(),
            })
        }
    }
}

#[derive(Clone)]
pub struct WriteCoordinator {
    state: Arc<LeaderState>,
}

impl WriteCoordinator {
    pub fn new(state: Arc<LeaderState>) -> Self {
        Self { state }
    }

    /// Store `text` under `id` locally and on up to `tolerance` alive members.
    ///
    /// Only a local storage failure is an `Err` here; member failures are
    /// reported through the returned [`WriteOutcome`].
    pub async fn set(&self, id: i64, text: &str) -> Result<WriteOutcome> {
        let state = &self.state;

        state.store.save(id, text).await.map_err(|e| {
            tracing::error!(id, error = %e, "local save failed, nothing replicated");
            e
        })?;
        state.index.record(id, LEADER_SENTINEL);

        let targets = state
            .selector
            .select(&state.directory, state.tolerance.get(), id);
        let mut outcome = WriteOutcome {
            selected: targets.iter().map(|m| m.id.clone()).collect(),
            ..Default::default()
        };
        if targets.is_empty() {
            tracing::warn!(id, "no alive members, message stored on leader only");
            return Ok(outcome);
        }

        let results = join_all(
            targets
                .iter()
                .map(|member| state.client.store(member, id, text)),
        )
        .await;

        for (member, result) in targets.iter().zip(results) {
            match result {
                Ok(true) => {
                    state.directory.observe(&member.id, Observation::Reachable);
                    state.index.record(id, &member.id);
                    tracing::info!(id, member = %member.id, "[SET SUCCESS] message {} stored on {}", id, member.id);
                    outcome.stored.push(member.id.clone());
                }
                Ok(false) => {
                    state.index.remove(id, &member.id);
                    tracing::warn!(id, member = %member.id, "member refused message {}", id);
                    outcome.refused.push(member.id.clone());
                }
                Err(err) => {
                    self.on_transport_failure(id, &member.id, &err);
                    outcome.crashed.push(member.id.clone());
                }
            }
        }

        if !outcome.crashed.is_empty() {
            tracing::warn!(
                id,
                crashed = ?outcome.crashed,
                "[SET CRASH] message {} could not reach {:?}",
                id,
                outcome.crashed
            );
        }
        Ok(outcome)
    }

    fn on_transport_failure(&self, id: i64, member: &str, err: &RpcError) {
        self.state
            .directory
            .observe(member, Observation::Unreachable(err.to_string()));
        // An earlier SET of the same id may have indexed this member
        self.state.index.remove(id, member);
    }
}
