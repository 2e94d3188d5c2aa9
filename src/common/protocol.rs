//! Wire formats
//!
//! - the client-facing line protocol spoken by the leader
//! - the JSON payloads of the leader → member RPC

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const OK: &str = "OK";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const REGISTERED: &str = "REGISTERED";
pub const ERROR_PREFIX: &str = "ERROR: ";

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { id: i64, text: String },
    Get { id: i64 },
    /// Member announcing itself to the leader
    Register { member: String, host: String, port: u16 },
    /// Member signalling that it is still up
    Heartbeat { member: String },
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Register { .. } => "REGISTER",
            Command::Heartbeat { .. } => "HEARTBEAT",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Set { id, text } => write!(f, "SET {} {}", id, text),
            Command::Get { id } => write!(f, "GET {}", id),
            Command::Register { member, host, port } => {
                write!(f, "REGISTER {} {} {}", member, host, port)
            }
            Command::Heartbeat { member } => write!(f, "HEARTBEAT {}", member),
        }
    }
}

/// Splits off the first whitespace-delimited token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(pos) => Some((&s[..pos], s[pos..].trim_start())),
        None => Some((s, "")),
    }
}

pub fn parse_message_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::InvalidMessageId(raw.to_string()))
}

/// Parse one client line.
///
/// The line is trimmed, the verb is case-insensitive and the SET text is the
/// rest of the line after the id, inner whitespace preserved.
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) =
        next_token(line).ok_or_else(|| Error::InvalidCommand("empty command".into()))?;

    match verb.to_ascii_uppercase().as_str() {
        "SET" => {
            let usage = || Error::InvalidCommand("usage: SET <id> <message>".into());
            let (id, text) = next_token(rest).ok_or_else(usage)?;
            if text.is_empty() {
                return Err(usage());
            }
            Ok(Command::Set {
                id: parse_message_id(id)?,
                text: text.to_string(),
            })
        }
        "GET" => {
            let (id, _) = next_token(rest)
                .ok_or_else(|| Error::InvalidCommand("usage: GET <id>".into()))?;
            Ok(Command::Get {
                id: parse_message_id(id)?,
            })
        }
        "REGISTER" => {
            let usage = || Error::InvalidCommand("usage: REGISTER <member> <host> <port>".into());
            let (member, rest) = next_token(rest).ok_or_else(usage)?;
            let (host, rest) = next_token(rest).ok_or_else(usage)?;
            let (port, _) = next_token(rest).ok_or_else(usage)?;
            let port = port
                .parse()
                .map_err(|_| Error::InvalidCommand(format!("invalid port: {}", port)))?;
            Ok(Command::Register {
                member: member.to_string(),
                host: host.to_string(),
                port,
            })
        }
        "HEARTBEAT" => {
            let (member, _) = next_token(rest)
                .ok_or_else(|| Error::InvalidCommand("usage: HEARTBEAT <member>".into()))?;
            Ok(Command::Heartbeat {
                member: member.to_string(),
            })
        }
        other => Err(Error::InvalidCommand(format!(
            "unknown command: {}. Supported commands: SET, GET",
            other
        ))),
    }
}

/// A single reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Value(String),
    NotFound,
    Registered,
    Error(String),
}

impl Reply {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Reply::Error(err.to_string())
    }

    /// Client-side interpretation of a reply line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            OK => Reply::Ok,
            NOT_FOUND => Reply::NotFound,
            REGISTERED => Reply::Registered,
            _ => match line.strip_prefix(ERROR_PREFIX) {
                Some(reason) => Reply::Error(reason.to_string()),
                None => Reply::Value(line.to_string()),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl From<Error> for Reply {
    fn from(err: Error) -> Self {
        Reply::error(err)
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Ok => f.write_str(OK),
            Reply::Value(text) => f.write_str(text),
            Reply::NotFound => f.write_str(NOT_FOUND),
            Reply::Registered => f.write_str(REGISTERED),
            Reply::Error(reason) => write!(f, "{}{}", ERROR_PREFIX, reason),
        }
    }
}

// === Member RPC payloads ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
}

/// An empty `text` means the member does not hold the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub id: i64,
    pub text: String,
}
