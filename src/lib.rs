//! # relaykv
//!
//! A leader/member replicated message store:
//! - Clients talk a one-line-per-call text protocol to a single leader
//! - The leader keeps its own durable copy and fans each write out to
//!   `tolerance` members picked by round-robin or hash-based selection
//! - Reads are served locally, falling back to indexed members in order
//! - Member liveness is learned from the leader's own RPC outcomes
//!
//! ## Architecture
//!
//! ```text
//!        clients (SET / GET lines)
//!                  │ TCP
//!        ┌─────────▼──────────┐
//!        │       Leader       │
//!        │ directory, index,  │
//!        │ selector, store    │
//!        └───┬──────┬──────┬──┘
//!            │ HTTP/JSON   │
//!   ┌────────▼┐ ┌───▼────┐ ┌▼────────┐
//!   │ member1 │ │member2 │ │ member3 │
//!   └─────────┘ └────────┘ └─────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a leader
//! ```bash
//! relaykv-leader serve \
//!   --bind 0.0.0.0:8080 \
//!   --tolerance 2 \
//!   --policy hash-based \
//!   --member member1@localhost:9091 --member member2@localhost:9092
//! ```
//!
//! ### Start a member
//! ```bash
//! relaykv-member serve --id member1 --bind 0.0.0.0:9091 --leader 127.0.0.1:8080
//! ```
//!
//! ### Use the CLI
//! ```bash
//! relaykv set 5 hello world
//! relaykv get 5
//! relaykv repl
//! ```

pub mod client;
pub mod common;
pub mod leader;
pub mod member;

// Re-export commonly used types
pub use client::LeaderClient;
pub use common::{Error, LeaderConfig, MemberConfig, Result};
pub use leader::Leader;
pub use member::MemberServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
