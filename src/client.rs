//! Line-protocol client for the leader
//!
//! Used by the CLI, by members for registration and heartbeats, and by the
//! end-to-end tests.

use crate::common::protocol::{Command, Reply};
use crate::common::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct LeaderClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LeaderClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send one raw line and read the reply line.
    ///
    /// A line break anywhere but at the very end is rejected before anything
    /// is written, since the leader would read it as two commands.
    pub async fn send(&mut self, line: &str) -> Result<Reply> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.contains(['\r', '\n']) {
            return Err(Error::InvalidCommand(
                "command must fit on a single line".into(),
            ));
        }
        self.writer.write_all(format!("{}\n", line).as_bytes()).await?;

        let mut buf = String::new();
        if self.reader.read_line(&mut buf).await? == 0 {
            return Err(Error::ConnectionFailed("leader closed the connection".into()));
        }
        Ok(Reply::parse(&buf))
    }

    pub async fn execute(&mut self, command: &Command) -> Result<Reply> {
        self.send(&command.to_string()).await
    }

    /// Fails with `InvalidCommand` when `text` contains a line break.
    pub async fn set(&mut self, id: i64, text: &str) -> Result<()> {
        if text.contains(['\r', '\n']) {
            return Err(Error::InvalidCommand(
                "message text must not contain line breaks".into(),
            ));
        }
        let reply = self
            .execute(&Command::Set {
                id,
                text: text.to_string(),
            })
            .await?;
        expect_reply(reply, Reply::Ok)
    }

    /// `Ok(None)` when the leader answers `NOT_FOUND`.
    pub async fn get(&mut self, id: i64) -> Result<Option<String>> {
        match self.execute(&Command::Get { id }).await? {
            Reply::Value(text) => Ok(Some(text)),
            // a stored message may literally read "OK"
            Reply::Ok => Ok(Some(crate::common::protocol::OK.to_string())),
            Reply::NotFound => Ok(None),
            Reply::Error(reason) => Err(Error::Remote(reason)),
            Reply::Registered => Ok(Some(crate::common::protocol::REGISTERED.to_string())),
        }
    }

    pub async fn register(&mut self, member: &str, host: &str, port: u16) -> Result<()> {
        let reply = self
            .execute(&Command::Register {
                member: member.to_string(),
                host: host.to_string(),
                port,
            })
            .await?;
        expect_reply(reply, Reply::Registered)
    }

    pub async fn heartbeat(&mut self, member: &str) -> Result<()> {
        let reply = self
            .execute(&Command::Heartbeat {
                member: member.to_string(),
            })
            .await?;
        expect_reply(reply, Reply::Ok)
    }
}

fn expect_reply(reply: Reply, wanted: Reply) -> Result<()> {
    match reply {
        r if r == wanted => Ok(()),
        Reply::Error(reason) => Err(Error::Remote(reason)),
        other => Err(Error::Protocol(other.to_string())),
    }
}
