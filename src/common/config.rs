//! Configuration for relaykv components
//!
//! Both node kinds load their settings the same way: built-in defaults, then
//! an optional TOML file, then `RELAYKV_LEADER_*` / `RELAYKV_MEMBER_*`
//! environment variables. CLI flags are applied on top by the binaries.

use crate::common::storage::IoMode;
use crate::common::{Error, Result};
use crate::leader::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_TOLERANCE: u8 = 1;
pub const MAX_TOLERANCE: u8 = 7;
pub const DEFAULT_TOLERANCE: u8 = 1;

/// Number of members each write is fanned out to. Always within 1..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tolerance(u8);

impl Tolerance {
    pub fn new(value: u8) -> Result<Self> {
        if !(MIN_TOLERANCE..=MAX_TOLERANCE).contains(&value) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be between {} and {}, got {}",
                MIN_TOLERANCE, MAX_TOLERANCE, value
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Read a `tolerance.conf` style file (`TOLERANCE=<n>` lines).
    ///
    /// A missing file, or one without a `TOLERANCE` line, yields the default.
    /// A present but malformed or out-of-range value is an error.
    pub fn from_conf_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "{} not found, using default TOLERANCE={}",
                path.display(),
                DEFAULT_TOLERANCE
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse_conf(&contents)
    }

    pub fn parse_conf(contents: &str) -> Result<Self> {
        let mut tolerance = None;

        for (idx, raw) in contents.lines().enumerate() {
            let line_number = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.strip_prefix("TOLERANCE=") {
                Some(value) => {
                    let value = value.trim();
                    if value.is_empty() {
                        return Err(Error::InvalidConfig(format!(
                            "TOLERANCE is empty (line {})",
                            line_number
                        )));
                    }
                    let parsed: i64 = value.parse().map_err(|_| {
                        Error::InvalidConfig(format!(
                            "TOLERANCE is not a number (line {}): {}",
                            line_number, line
                        ))
                    })?;
                    let parsed = u8::try_from(parsed).map_err(|_| {
                        Error::InvalidConfig(format!(
                            "TOLERANCE must be between {} and {}, got {} (line {})",
                            MIN_TOLERANCE, MAX_TOLERANCE, parsed, line_number
                        ))
                    })?;
                    tolerance = Some(Self::new(parsed)?);
                }
                None => {
                    tracing::warn!(line = line_number, "ignoring unknown config line: {}", line);
                }
            }
        }

        match tolerance {
            Some(t) => {
                tracing::info!("loaded TOLERANCE={}", t.0);
                Ok(t)
            }
            None => {
                tracing::warn!(
                    "no TOLERANCE entry found, using default TOLERANCE={}",
                    DEFAULT_TOLERANCE
                );
                Ok(Self::default())
            }
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

impl TryFrom<u8> for Tolerance {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Tolerance> for u8 {
    fn from(t: Tolerance) -> u8 {
        t.0
    }
}

impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A member endpoint known to the leader at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEndpoint {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl std::str::FromStr for MemberEndpoint {
    type Err = Error;

    /// Parses `id@host:port`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("member must be id@host:port, got {}", s));
        let (id, addr) = s.split_once('@').ok_or_else(invalid)?;
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if id.is_empty() || host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self {
            id: id.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Leader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// Bind address for the client line protocol
    pub bind_addr: SocketAddr,

    /// Directory holding the leader's own message copies
    pub data_dir: PathBuf,

    /// Members each write is fanned out to
    pub tolerance: Tolerance,

    /// Optional legacy `tolerance.conf`; overrides `tolerance` when set
    pub tolerance_file: Option<PathBuf>,

    /// Replica selection policy
    pub policy: SelectionPolicy,

    pub io_mode: IoMode,

    /// Timeout for a single member RPC
    pub rpc_timeout_ms: u64,

    pub stats_interval_secs: u64,

    /// Members registered at startup
    pub members: Vec<MemberEndpoint>,

    pub log_level: String,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./leader-data"),
            tolerance: Tolerance::default(),
            tolerance_file: None,
            policy: SelectionPolicy::HashBased,
            io_mode: IoMode::Buffered,
            rpc_timeout_ms: 2000,
            stats_interval_secs: 10,
            members: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl LeaderConfig {
    /// Load defaults, then `path` (if any), then `RELAYKV_LEADER_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut conf: LeaderConfig = load_layers(path, "RELAYKV_LEADER")?;
        conf.resolve_tolerance()?;
        Ok(conf)
    }

    /// Apply `tolerance_file` if one is configured.
    pub fn resolve_tolerance(&mut self) -> Result<()> {
        if let Some(file) = &self.tolerance_file {
            self.tolerance = Tolerance::from_conf_file(file)?;
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

/// Member configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberConfig {
    /// Member ID (unique across the cluster)
    pub id: String,

    /// Bind address for the member RPC API
    pub bind_addr: SocketAddr,

    /// Host name announced to the leader
    pub advertise_host: String,

    pub data_dir: PathBuf,

    /// Leader line-protocol address
    pub leader_addr: String,

    pub io_mode: IoMode,

    pub heartbeat_interval_secs: u64,

    pub stats_interval_secs: u64,

    pub log_level: String,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            id: "member-9090".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            advertise_host: "localhost".to_string(),
            data_dir: PathBuf::from("./member-data"),
            leader_addr: "127.0.0.1:8080".to_string(),
            io_mode: IoMode::Buffered,
            heartbeat_interval_secs: 5,
            stats_interval_secs: 10,
            log_level: default_log_level(),
        }
    }
}

impl MemberConfig {
    /// Load defaults, then `path` (if any), then `RELAYKV_MEMBER_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_layers(path, "RELAYKV_MEMBER")
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

fn load_layers<T: serde::de::DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}
