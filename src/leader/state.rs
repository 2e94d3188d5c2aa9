//! State shared by every client connection on the leader

use crate::common::{MessageStore, Tolerance};
use crate::leader::directory::ReplicaDirectory;
use crate::leader::index::MessageIndex;
use crate::leader::member_client::MemberClient;
use crate::leader::selector::{ReplicaSelector, SelectionPolicy};
use std::sync::Arc;

/// Each structure synchronizes itself; there is no lock spanning them.
pub struct LeaderState {
    pub store: Arc<dyn MessageStore>,
    pub directory: ReplicaDirectory,
    pub selector: ReplicaSelector,
    pub index: MessageIndex,
    pub client: Arc<dyn MemberClient>,
    pub tolerance: Tolerance,
}

impl LeaderState {
    pub fn new(
        store: Arc<dyn MessageStore>,
        client: Arc<dyn MemberClient>,
        policy: SelectionPolicy,
        tolerance: Tolerance,
    ) -> Self {
        Self {
            store,
            directory: ReplicaDirectory::new(),
            selector: ReplicaSelector::new(policy),
            index: MessageIndex::new(),
            client,
            tolerance,
        }
    }
}
