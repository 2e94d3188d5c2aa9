//! Leader server: the client line protocol over TCP

use crate::common::protocol::{parse_command, Command, Reply};
use crate::common::{Error, FileStore, LeaderConfig, MessageStore, Result};
use crate::leader::member_client::{HttpMemberClient, MemberClient};
use crate::leader::read::ReadCoordinator;
use crate::leader::state::LeaderState;
use crate::leader::stats::start_stats_reporter;
use crate::leader::write::{WriteCoordinator, WriteOutcome};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Longest accepted request line in bytes, newline excluded
pub const MAX_LINE: usize = 64 * 1024;

/// Turns one client line into one reply line.
#[derive(Clone)]
pub struct CommandHandler {
    state: Arc<LeaderState>,
    writer: WriteCoordinator,
    reader: ReadCoordinator,
}

impl CommandHandler {
    pub fn new(state: Arc<LeaderState>) -> Self {
        Self {
            writer: WriteCoordinator::new(state.clone()),
            reader: ReadCoordinator::new(state.clone()),
            state,
        }
    }

    pub async fn handle_line(&self, line: &str) -> Reply {
        match parse_command(line) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                tracing::debug!(line, error = %e, "rejected command");
                Reply::from(e)
            }
        }
    }

    pub async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::Set { id, text } => {
                match self
                    .writer
                    .set(id, &text)
                    .await
                    .and_then(WriteOutcome::into_result)
                {
                    Ok(_) => Reply::Ok,
                    Err(e) => Reply::from(e),
                }
            }
            Command::Get { id } => match self.reader.get(id).await {
                Ok(outcome) => outcome.into_text().map_or(Reply::NotFound, Reply::Value),
                Err(e) => {
                    tracing::error!(id, error = %e, "local read failed");
                    Reply::from(e)
                }
            },
            Command::Register { member, host, port } => {
                self.state.directory.register(&member, &host, port);
                Reply::Registered
            }
            Command::Heartbeat { member } => {
                if self.state.directory.find(&member).is_none() {
                    return Reply::from(Error::UnknownMember(member));
                }
                self.state.directory.mark_alive(&member);
                tracing::debug!(member = %member, "heartbeat");
                Reply::Ok
            }
        }
    }
}

pub struct Leader {
    config: LeaderConfig,
    state: Arc<LeaderState>,
}

impl Leader {
    /// Open the on-disk store and the HTTP member client described by `config`.
    pub async fn new(config: LeaderConfig) -> Result<Self> {
        let store = FileStore::open(&config.data_dir, config.io_mode).await?;
        let client = HttpMemberClient::new(config.rpc_timeout())?;
        Ok(Self::with_parts(config, Arc::new(store), Arc::new(client)))
    }

    pub fn with_parts(
        config: LeaderConfig,
        store: Arc<dyn MessageStore>,
        client: Arc<dyn MemberClient>,
    ) -> Self {
        let state = Arc::new(LeaderState::new(
            store,
            client,
            config.policy,
            config.tolerance,
        ));
        Self { config, state }
    }

    pub fn state(&self) -> Arc<LeaderState> {
        self.state.clone()
    }

    /// Register every configured member as alive.
    pub fn bootstrap(&self) {
        for member in &self.config.members {
            self.state
                .directory
                .register(&member.id, &member.host, member.port);
        }
        self.log_registered_members();
    }

    fn log_registered_members(&self) {
        let alive = self.state.directory.snapshot_alive();
        let dead = self.state.directory.snapshot_dead();
        tracing::info!("Registered members: {}", alive.len() + dead.len());
        for member in alive.iter().chain(dead.iter()) {
            tracing::info!("  {} [{}]", member, member.status);
        }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run(listener, std::future::pending()).await
    }

    /// Accept clients on `listener` until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tracing::info!("Starting leader");
        tracing::info!("  Client API: {}", listener.local_addr()?);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());
        tracing::info!("  Tolerance: {}", self.config.tolerance);
        tracing::info!("  Policy: {}", self.config.policy);

        self.bootstrap();
        let stats = start_stats_reporter(self.state.clone(), self.config.stats_interval());
        let handler = CommandHandler::new(self.state.clone());

        tracing::info!("✓ Leader ready");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(handler, socket, peer).await {
                                tracing::debug!(%peer, error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!("accept failed: {}", e),
                },
                _ = &mut shutdown => {
                    tracing::info!("Leader shutting down");
                    break;
                }
            }
        }

        stats.abort();
        Ok(())
    }
}

async fn handle_connection(
    handler: CommandHandler,
    socket: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    tracing::info!(%peer, "client connected");
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(request) = next_request(&mut reader).await? {
        let reply = match request {
            Ok(line) => handler.handle_line(&line).await,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "unreadable request line");
                Reply::from(e)
            }
        };
        write_half
            .write_all(format!("{}\n", reply).as_bytes())
            .await?;
    }

    tracing::info!(%peer, "client disconnected");
    Ok(())
}

/// Read one request line. `Ok(None)` at end of stream.
///
/// A line longer than [`MAX_LINE`] or not valid UTF-8 yields `Some(Err(_))`
/// and the reader is left at the start of the next line.
async fn next_request<R>(reader: &mut R) -> std::io::Result<Option<Result<String>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE {
        skip_line(reader).await?;
        return Ok(Some(Err(Error::InvalidCommand(format!(
            "line too long (max {} bytes)",
            MAX_LINE
        )))));
    }
    Ok(Some(String::from_utf8(buf).map_err(|_| {
        Error::InvalidCommand("invalid UTF-8".into())
    })))
}

/// Discard input up to and including the next newline.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut scratch)
            .await?;
        if n == 0 || scratch.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}
