//! Error types for relaykv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Protocol Errors ===
    #[error("{0}")]
    InvalidCommand(String),

    #[error("invalid message id: {0} (must be an integer)")]
    InvalidMessageId(String),

    #[error("unexpected reply: {0}")]
    Protocol(String),

    // === Storage Errors ===
    #[error("local storage failure: {0}")]
    Storage(String),

    // === Replication Errors ===
    #[error("replication failed: stored on {stored} of {selected} members")]
    PartialReplication { stored: usize, selected: usize },

    #[error("unknown member: {0}")]
    UnknownMember(String),

    // === Network Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("leader replied with error: {0}")]
    Remote(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that never touched the directory, the index or a member.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidCommand(_) | Error::InvalidMessageId(_))
    }
}
