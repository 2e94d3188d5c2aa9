//! Member binary

use anyhow::Result;
use clap::{Parser, Subcommand};
use relaykv::common::{IoMode, MemberConfig};
use relaykv::MemberServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaykv-member")]
#[command(about = "relaykv member: stores message copies for the leader")]
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
    /// Start the member
    Serve {
        /// Member ID (unique across the cluster)
        #[arg(long)]
        id: Option<String>,

        /// Bind address for the member API
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Host name announced to the leader
        #[arg(long)]
        advertise_host: Option<String>,

        /// Leader address
        #[arg(long)]
        leader: Option<String>,

        /// Data directory for messages
        #[arg(long)]
        data: Option<PathBuf>,

        /// buffered or unbuffered
        #[arg(long)]
        io_mode: Option<IoMode>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            id,
            bind,
            advertise_host,
            leader,
            data,
            io_mode,
            log_level,
        } => {
            let mut config = MemberConfig::load(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
                // default id follows the port, as in member-9091
                if id.is_none() && config.id == MemberConfig::default().id {
                    config.id = format!("member-{}", bind.port());
                }
            }
            if let Some(id) = id {
                config.id = id;
            }
            if let Some(host) = advertise_host {
                config.advertise_host = host;
            }
            if let Some(leader) = leader {
                config.leader_addr = leader;
            }
            if let Some(data) = data {
                config.data_dir = data;
            }
            if let Some(io_mode) = io_mode {
                config.io_mode = io_mode;
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
            MemberServer::new(config)
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
