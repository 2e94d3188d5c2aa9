//! Helpers that start real leader and member servers on loopback ports

#![allow(dead_code)]

use relaykv::common::{IoMode, LeaderConfig, MemberConfig, MemberEndpoint, Tolerance};
use relaykv::leader::{LeaderState, SelectionPolicy};
use relaykv::{Leader, LeaderClient, MemberServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct MemberHandle {
    pub id: String,
    pub port: u16,
    pub data_dir: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<relaykv::Result<()>>>,
}

impl MemberHandle {
    pub fn endpoint(&self) -> MemberEndpoint {
        MemberEndpoint {
            id: self.id.clone(),
            host: "127.0.0.1".into(),
            port: self.port,
        }
    }

    pub fn holds(&self, id: i64) -> bool {
        self.data_dir.join(format!("{}.msg", id)).exists()
    }

    /// Stop serving and wait until the listener is gone.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }
}

pub struct Cluster {
    pub leader_addr: SocketAddr,
    pub leader_dir: PathBuf,
    pub state: Arc<LeaderState>,
    pub members: Vec<MemberHandle>,
    _dir: TempDir,
}

impl Cluster {
    pub async fn client(&self) -> LeaderClient {
        LeaderClient::connect(self.leader_addr).await.unwrap()
    }

    pub fn member(&self, id: &str) -> &MemberHandle {
        self.members.iter().find(|m| m.id == id).unwrap()
    }

    pub fn member_mut(&mut self, id: &str) -> &mut MemberHandle {
        self.members.iter_mut().find(|m| m.id == id).unwrap()
    }
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a leader plus `live` members named m1..mN. `unreachable` lists extra
/// member ids registered at bootstrap but pointing at closed ports; all
/// bootstrap members keep the order `ids` gives them.
pub async fn start_cluster(
    ids: &[&str],
    unreachable: &[&str],
    tolerance: u8,
    policy: SelectionPolicy,
) -> Cluster {
    let dir = TempDir::new().unwrap();
    let leader_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let leader_addr = leader_listener.local_addr().unwrap();

    let mut members = Vec::new();
    let mut endpoints = Vec::new();
    for id in ids {
        if unreachable.contains(id) {
            endpoints.push(MemberEndpoint {
                id: id.to_string(),
                host: "127.0.0.1".into(),
                port: closed_port(),
            });
            continue;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let data_dir = dir.path().join(id);
        let config = MemberConfig {
            id: id.to_string(),
            bind_addr: listener.local_addr().unwrap(),
            advertise_host: "127.0.0.1".into(),
            data_dir: data_dir.clone(),
            leader_addr: leader_addr.to_string(),
            io_mode: IoMode::Unbuffered,
            heartbeat_interval_secs: 1,
            ..Default::default()
        };
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(MemberServer::new(config).run(listener, async move {
            let _ = rx.await;
        }));
        let handle = MemberHandle {
            id: id.to_string(),
            port,
            data_dir,
            shutdown: Some(tx),
            task: Some(task),
        };
        endpoints.push(handle.endpoint());
        members.push(handle);
    }

    let leader_dir = dir.path().join("leader");
    let config = LeaderConfig {
        bind_addr: leader_addr,
        data_dir: leader_dir.clone(),
        tolerance: Tolerance::new(tolerance).unwrap(),
        policy,
        rpc_timeout_ms: 1000,
        members: endpoints,
        ..Default::default()
    };
    let leader = Leader::new(config).await.unwrap();
    let state = leader.state();
    tokio::spawn(leader.run(leader_listener, std::future::pending()));

    Cluster {
        leader_addr,
        leader_dir,
        state,
        members,
        _dir: dir,
    }
}
