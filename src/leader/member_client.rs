//! Leader → member RPC
//!
//! Transport failures (`Err(RpcError)`) are kept apart from application-level
//! answers (`Ok(false)` / `Ok("")`): only the former change a member's liveness.

use crate::common::protocol::{RetrieveResponse, StoreRequest, StoreResponse};
use crate::leader::directory::ReplicaDescriptor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("member answered HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MemberClient: Send + Sync {
    /// Ask `member` to store `text` under `id`. `Ok(false)` is an explicit refusal.
    async fn store(
        &self,
        member: &ReplicaDescriptor,
        id: i64,
        text: &str,
    ) -> Result<bool, RpcError>;

    /// Fetch `id` from `member`. An empty string means the member does not hold it.
    async fn retrieve(&self, member: &ReplicaDescriptor, id: i64) -> Result<String, RpcError>;
}

/// JSON over HTTP, one request per call
#[derive(Clone)]
pub struct HttpMemberClient {
    http: reqwest::Client,
}

impl HttpMemberClient {
    pub fn new(timeout: Duration) -> crate::common::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| crate::common::Error::Internal(format!("http client: {}", e)))?;
        Ok(Self { http })
    }

    fn message_url(member: &ReplicaDescriptor, id: i64) -> String {
        format!("{}/messages/{}", member.base_url(), id)
    }
}

fn transport(err: reqwest::Error) -> RpcError {
    if err.is_decode() {
        RpcError::Decode(err.to_string())
    } else {
        RpcError::Transport(err.to_string())
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), RpcError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(RpcError::Status(status.as_u16()))
    }
}

#[async_trait]
impl MemberClient for HttpMemberClient {
    async fn store(
        &self,
        member: &ReplicaDescriptor,
        id: i64,
        text: &str,
    ) -> Result<bool, RpcError> {
        let response = self
            .http
            .put(Self::message_url(member, id))
            .json(&StoreRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        check_status(&response)?;
        let body: StoreResponse = response.json().await.map_err(transport)?;
        Ok(body.success)
    }

    async fn retrieve(&self, member: &ReplicaDescriptor, id: i64) -> Result<String, RpcError> {
        let response = self
            .http
            .get(Self::message_url(member, id))
            .send()
            .await
            .map_err(transport)?;
        check_status(&response)?;
        let body: RetrieveResponse = response.json().await.map_err(transport)?;
        Ok(body.text)
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! In-process member double for coordinator tests.

    use super::*;
    use crate::leader::state::LeaderState;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, Weak};

    /// Outcome of one scripted call
    #[derive(Debug, Clone)]
    pub enum Step {
        Ack,
        Nack,
        Value(String),
        Down,
        /// The leader marks the member dead while the call is in flight,
        /// then the call resolves as the inner step.
        AfterMarkedDead(Box<Step>),
    }

    impl Step {
        fn store_result(&self) -> Result<bool, RpcError> {
            match self {
                Step::Ack | Step::Value(_) => Ok(true),
                Step::Nack => Ok(false),
                Step::Down => Err(RpcError::Transport("connection refused".into())),
                Step::AfterMarkedDead(inner) => inner.store_result(),
            }
        }

        fn retrieve_result(&self) -> Result<String, RpcError> {
            match self {
                Step::Value(text) => Ok(text.clone()),
                Step::Ack | Step::Nack => Ok(String::new()),
                Step::Down => Err(RpcError::Transport("connection refused".into())),
                Step::AfterMarkedDead(inner) => inner.retrieve_result(),
            }
        }
    }

    /// Per-member queues of outcomes. Once a queue runs dry its last step repeats;
    /// members with no script answer `Ack` to stores and `""` to retrieves.
    #[derive(Default)]
    pub struct ScriptedClient {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        last: Mutex<HashMap<String, Step>>,
        calls: Mutex<Vec<String>>,
        leader: Mutex<Weak<LeaderState>>,
    }

    impl ScriptedClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, member: &str, steps: impl IntoIterator<Item = Step>) {
            self.scripts
                .lock()
                .unwrap()
                .insert(member.to_string(), steps.into_iter().collect());
        }

        /// Directory that `Step::AfterMarkedDead` acts on
        pub fn attach(&self, state: &Arc<LeaderState>) {
            *self.leader.lock().unwrap() = Arc::downgrade(state);
        }

        /// Members contacted, in call order
        pub fn contacted(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn next(&self, member: &str) -> Option<Step> {
            self.calls.lock().unwrap().push(member.to_string());
            let mut scripts = self.scripts.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            let step = match scripts.get_mut(member).and_then(|q| q.pop_front()) {
                Some(step) => {
                    last.insert(member.to_string(), step.clone());
                    Some(step)
                }
                None => last.get(member).cloned(),
            };
            if let Some(Step::AfterMarkedDead(_)) = &step {
                if let Some(state) = self.leader.lock().unwrap().upgrade() {
                    state.directory.mark_dead(member, "timed out on another request");
                }
            }
            step
        }
    }

    #[async_trait]
    impl MemberClient for ScriptedClient {
        async fn store(
            &self,
            member: &ReplicaDescriptor,
            _id: i64,
            _text: &str,
        ) -> Result<bool, RpcError> {
            self.next(&member.id)
                .map_or(Ok(true), |step| step.store_result())
        }

        async fn retrieve(&self, member: &ReplicaDescriptor, _id: i64) -> Result<String, RpcError> {
            self.next(&member.id)
                .map_or(Ok(String::new()), |step| step.retrieve_result())
        }
    }
}
