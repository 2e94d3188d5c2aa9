//! Leader node: accepts client commands and replicates messages to members

pub mod directory;
pub mod index;
pub mod member_client;
pub mod read;
pub mod selector;
pub mod server;
pub mod state;
pub mod stats;
pub mod write;

pub use directory::{Observation, ReplicaDescriptor, ReplicaDirectory, ReplicaStatus, Transition};
pub use index::{MessageIndex, LEADER_SENTINEL};
pub use member_client::{HttpMemberClient, MemberClient, RpcError};
pub use read::{ReadCoordinator, ReadOutcome};
pub use selector::{ReplicaSelector, SelectionPolicy};
pub use server::{CommandHandler, Leader, MAX_LINE};
pub use state::LeaderState;
pub use write::{WriteCoordinator, WriteOutcome};
