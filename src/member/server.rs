//! Member server

use crate::client::LeaderClient;
use crate::common::{FileStore, MemberConfig, MessageStore, Result};
use crate::member::http::{create_router, MemberState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct MemberServer {
    config: MemberConfig,
}

impl MemberServer {
    pub fn new(config: MemberConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run(listener, std::future::pending()).await
    }

    /// Serve the member API on `listener` until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let port = listener.local_addr()?.port();
        tracing::info!("Starting member: {}", self.config.id);
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!("  Advertised as: {}:{}", self.config.advertise_host, port);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());
        tracing::info!("  Leader: {}", self.config.leader_addr);

        let store: Arc<dyn MessageStore> =
            Arc::new(FileStore::open(&self.config.data_dir, self.config.io_mode).await?);

        let heartbeat = start_heartbeat(
            self.config.leader_addr.clone(),
            self.config.id.clone(),
            self.config.advertise_host.clone(),
            port,
            self.config.heartbeat_interval(),
        );
        let stats = start_member_stats(
            store.clone(),
            self.config.id.clone(),
            self.config.stats_interval(),
        );

        let router = create_router(MemberState {
            store,
            member_id: self.config.id.clone(),
        });

        tracing::info!("✓ Member ready");

        let res = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        heartbeat.abort();
        stats.abort();
        if let Err(e) = res {
            tracing::error!("HTTP server error: {}", e);
            return Err(e.into());
        }
        tracing::info!("Member {} stopped", self.config.id);
        Ok(())
    }
}

/// Register with the leader, then heartbeat every `interval`. A heartbeat the
/// leader does not recognize triggers a fresh registration.
pub fn start_heartbeat(
    leader_addr: String,
    member_id: String,
    host: String,
    port: u16,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut registered = false;
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let res = async {
                let mut leader = LeaderClient::connect(leader_addr.as_str()).await?;
                if registered {
                    leader.heartbeat(&member_id).await
                } else {
                    leader.register(&member_id, &host, port).await
                }
            }
            .await;

            match res {
                Ok(()) if !registered => {
                    tracing::info!(leader = %leader_addr, "registered with leader as {}", member_id);
                    registered = true;
                }
                Ok(()) => tracing::debug!("heartbeat sent"),
                Err(crate::common::Error::Remote(reason)) => {
                    tracing::warn!("leader rejected heartbeat ({}), registering again", reason);
                    registered = false;
                }
                Err(e) => tracing::warn!(leader = %leader_addr, "leader unreachable: {}", e),
            }
        }
    })
}

fn start_member_stats(
    store: Arc<dyn MessageStore>,
    member_id: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.count().await {
                Ok(count) => tracing::info!(member = %member_id, messages = count, "[MEMBER STATS] {} holds {} messages", member_id, count),
                Err(e) => tracing::warn!(member = %member_id, "[MEMBER STATS] could not count messages: {}", e),
            }
        }
    })
}
