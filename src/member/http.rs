//! HTTP API of a member node
//!
//! - `PUT /messages/:id` stores `{"text"}` and answers `{"success"}`
//! - `GET /messages/:id` answers `{"id", "text"}`, `text` empty when absent
//! - `GET /health`

use crate::common::protocol::{RetrieveResponse, StoreRequest, StoreResponse};
use crate::common::MessageStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct MemberState {
    pub store: Arc<dyn MessageStore>,
    pub member_id: String,
}

pub fn create_router(state: MemberState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages/:id", put(store_message).get(retrieve_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<MemberState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "id": state.member_id }))
}

async fn store_message(
    State(state): State<MemberState>,
    Path(id): Path<i64>,
    Json(req): Json<StoreRequest>,
) -> Json<StoreResponse> {
    let success = match state.store.save(id, &req.text).await {
        Ok(()) => {
            tracing::info!(id, member = %state.member_id, "stored message {}", id);
            true
        }
        Err(e) => {
            tracing::error!(id, error = %e, "could not store message {}", id);
            false
        }
    };
    Json(StoreResponse { success })
}

async fn retrieve_message(
    State(state): State<MemberState>,
    Path(id): Path<i64>,
) -> Result<Json<RetrieveResponse>, (StatusCode, String)> {
    match state.store.load(id).await {
        Ok(text) => {
            if text.is_none() {
                tracing::debug!(id, "message not held");
            }
            Ok(Json(RetrieveResponse {
                id,
                text: text.unwrap_or_default(),
            }))
        }
        Err(e) => {
            tracing::error!(id, error = %e, "could not read message {}", id);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, MemStore, Result};
    use crate::leader::{HttpMemberClient, MemberClient, ReplicaDescriptor, RpcError};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_member(store: Arc<dyn MessageStore>) -> ReplicaDescriptor {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = create_router(MemberState {
            store,
            member_id: "m1".into(),
        });
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ReplicaDescriptor::new("m1", "127.0.0.1", port)
    }

    fn client() -> HttpMemberClient {
        HttpMemberClient::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_retrieve_over_http() {
        let store = Arc::new(MemStore::new());
        let member = spawn_member(store.clone()).await;
        let client = client();

        assert!(client.store(&member, 34, "İstanbul  twice").await.unwrap());
        assert_eq!(
            client.retrieve(&member, 34).await.unwrap(),
            "İstanbul  twice"
        );
        assert_eq!(store.load(34).await.unwrap().as_deref(), Some("İstanbul  twice"));
    }

    #[tokio::test]
    async fn test_missing_message_is_empty_text() {
        let member = spawn_member(Arc::new(MemStore::new())).await;
        assert_eq!(client().retrieve(&member, 404).await.unwrap(), "");
    }

    struct BrokenStore;

    #[async_trait]
    impl MessageStore for BrokenStore {
        async fn save(&self, _id: i64, _text: &str) -> Result<()> {
            Err(Error::Storage("disk full".into()))
        }
        async fn load(&self, _id: i64) -> Result<Option<String>> {
            Err(Error::Storage("disk unreadable".into()))
        }
        async fn delete(&self, _id: i64) -> Result<bool> {
            Ok(false)
        }
        async fn count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_local_failures() {
        let member = spawn_member(Arc::new(BrokenStore)).await;
        let client = client();

        // refusal, not a transport error
        assert!(!client.store(&member, 1, "x").await.unwrap());
        assert_eq!(
            client.retrieve(&member, 1).await.unwrap_err(),
            RpcError::Status(500)
        );
    }
}
