//! Leader binary

use clap::{Parser, Subcommand};
use relaykv::common::{IoMode, LeaderConfig, MemberEndpoint, Tolerance};
use relaykv::leader::SelectionPolicy;
use relaykv::Leader;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaykv-leader")]
#[command(about = "relaykv leader: accepts client commands and replicates to members")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the leader
    Serve {
        /// Bind address for the client protocol
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Local message directory
        #[arg(long)]
        data: Option<PathBuf>,

        /// Members per write (1-7)
        #[arg(long)]
        tolerance: Option<u8>,

        /// Legacy tolerance.conf file (TOLERANCE=<n>)
        #[arg(long)]
        tolerance_file: Option<PathBuf>,

        /// round-robin, hash-based or random
        #[arg(long)]
        policy: Option<String>,

        /// buffered or unbuffered
        #[arg(long)]
        io_mode: Option<IoMode>,

        /// Member RPC timeout in milliseconds
        #[arg(long)]
        rpc_timeout_ms: Option<u64>,

        /// Bootstrap members, id@host:port (repeatable or comma-separated)
        #[arg(long = "member", value_delimiter = ',')]
        members: Vec<MemberEndpoint>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            data,
            tolerance,
            tolerance_file,
            policy,
            io_mode,
            rpc_timeout_ms,
            members,
            log_level,
        } => {
            // File and environment first, CLI has priority
            let mut config = LeaderConfig::load(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(data) = data {
                config.data_dir = data;
            }
            if let Some(tolerance) = tolerance {
                config.tolerance = Tolerance::new(tolerance)?;
            }
            if let Some(file) = tolerance_file {
                config.tolerance_file = Some(file);
                config.resolve_tolerance()?;
            }
            if let Some(policy) = policy {
                config.policy = SelectionPolicy::from(policy);
            }
            if let Some(io_mode) = io_mode {
                config.io_mode = io_mode;
            }
            if let Some(ms) = rpc_timeout_ms {
                config.rpc_timeout_ms = ms;
            }
            if !members.is_empty() {
                config.members = members;
            }
            if let Some(level) = log_level {
                config.log_level = level;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
            let leader = Leader::new(config).await?;
            leader
                .run(listener, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("cannot listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }
    }

    Ok(())
}
