//! Member node: stores copies of messages at the leader's direction
//!
//! Exposes a small HTTP API to the leader, registers itself on start and
//! keeps heartbeating so the leader can bring it back after a failure.

pub mod http;
pub mod server;

pub use server::MemberServer;
