//! Common utilities and types shared across relaykv

pub mod config;
pub mod error;
pub mod protocol;
pub mod storage;

pub use config::{LeaderConfig, MemberConfig, MemberEndpoint, Tolerance};
pub use error::{Error, Result};
pub use protocol::{parse_command, Command, Reply};
pub use storage::{FileStore, IoMode, MemStore, MessageStore};
