//! Replica directory: the leader's view of which members are alive
//!
//! Liveness is only ever changed by what the leader itself observes. A member
//! is marked dead when an RPC to it fails at the transport level, and alive
//! again when a later RPC to it succeeds (or it registers / heartbeats).

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStatus {
    Alive,
    Dead,
}

impl std::fmt::Display for ReplicaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaStatus::Alive => write!(f, "ALIVE"),
            ReplicaStatus::Dead => write!(f, "DEAD"),
        }
    }
}

/// Identity of one member. Equality and hashing use `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub status: ReplicaStatus,
}

impl ReplicaDescriptor {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            status: ReplicaStatus::Alive,
        }
    }

    /// Base URL of the member RPC API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn is_alive(&self) -> bool {
        self.status == ReplicaStatus::Alive
    }
}

impl PartialEq for ReplicaDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReplicaDescriptor {}

impl Hash for ReplicaDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for ReplicaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.id, self.host, self.port)
    }
}

/// What a single RPC told the leader about a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The member answered (positively or negatively)
    Reachable,
    /// The call failed at the transport level
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    MarkedDead,
    MarkedAlive,
}

#[derive(Debug, Default)]
struct Members {
    alive: Vec<ReplicaDescriptor>,
    dead: Vec<ReplicaDescriptor>,
}

impl Members {
    fn take(list: &mut Vec<ReplicaDescriptor>, id: &str) -> Option<ReplicaDescriptor> {
        let pos = list.iter().position(|m| m.id == id)?;
        Some(list.remove(pos))
    }
}

/// Two disjoint collections, alive and dead. A member id is in at most one.
#[derive(Debug, Default)]
pub struct ReplicaDirectory {
    members: RwLock<Members>,
}

impl ReplicaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Members> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Members> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a member. Re-registration always resets it to alive.
    ///
    /// An already-alive member is updated in place so that repeated
    /// registrations do not reshuffle the alive order selection depends on.
    pub fn register(&self, id: &str, host: &str, port: u16) {
        {
            let mut members = self.write();
            match members.alive.iter_mut().find(|m| m.id == id) {
                Some(existing) => {
                    existing.host = host.to_string();
                    existing.port = port;
                }
                None => {
                    Members::take(&mut members.dead, id);
                    members.alive.push(ReplicaDescriptor::new(id, host, port));
                }
            }
        }
        tracing::info!(member = id, "Member registered: {} ({}:{})", id, host, port);
    }

    /// Drop a member from whichever collection holds it.
    pub fn remove(&self, id: &str) -> Option<ReplicaDescriptor> {
        let removed = {
            let mut members = self.write();
            Members::take(&mut members.alive, id).or_else(|| Members::take(&mut members.dead, id))
        };
        if removed.is_some() {
            tracing::info!(member = id, "member removed");
        }
        removed
    }

    /// Move an alive member to the dead list. Returns whether it moved.
    pub fn mark_dead(&self, id: &str, reason: &str) -> bool {
        let moved = {
            let mut members = self.write();
            match Members::take(&mut members.alive, id) {
                Some(mut member) => {
                    member.status = ReplicaStatus::Dead;
                    members.dead.push(member);
                    true
                }
                None => false,
            }
        };
        if moved {
            tracing::warn!(member = id, reason, "Member {} marked as DEAD", id);
        }
        moved
    }

    /// Move a dead member back to the alive list. Returns whether it moved.
    pub fn mark_alive(&self, id: &str) -> bool {
        let moved = {
            let mut members = self.write();
            match Members::take(&mut members.dead, id) {
                Some(mut member) => {
                    member.status = ReplicaStatus::Alive;
                    members.alive.push(member);
                    true
                }
                None => false,
            }
        };
        if moved {
            tracing::info!(member = id, "Member {} marked as ALIVE", id);
        }
        moved
    }

    /// The single liveness-transition entry point used by the coordinators.
    pub fn observe(&self, id: &str, observation: Observation) -> Option<Transition> {
        match observation {
            Observation::Reachable => self.mark_alive(id).then_some(Transition::MarkedAlive),
            Observation::Unreachable(reason) => {
                self.mark_dead(id, &reason).then_some(Transition::MarkedDead)
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<ReplicaDescriptor> {
        let members = self.read();
        members
            .alive
            .iter()
            .chain(members.dead.iter())
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.read().alive.iter().any(|m| m.id == id)
    }

    /// Point-in-time copy of the alive members, in directory order.
    pub fn snapshot_alive(&self) -> Vec<ReplicaDescriptor> {
        self.read().alive.clone()
    }

    pub fn snapshot_dead(&self) -> Vec<ReplicaDescriptor> {
        self.read().dead.clone()
    }

    pub fn alive_count(&self) -> usize {
        self.read().alive.len()
    }

    pub fn dead_count(&self) -> usize {
        self.read().dead.len()
    }

    pub fn len(&self) -> usize {
        let members = self.read();
        members.alive.len() + members.dead.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
