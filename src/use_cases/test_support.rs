use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::{Channel, Command, CommentStore, NewComment, Redaction, StoreError, StoreTx};
use crate::interface_adapters::store::MemoryStore;
use crate::use_cases::hub::{Hub, HubSettings};
use crate::use_cases::registry::{ClientHandle, ClientId};

pub(crate) fn hub_with(store: Arc<dyn CommentStore>, admin_id: Option<&str>) -> Hub {
    Hub::new(
        store,
        HubSettings {
            admin_id: admin_id.map(str::to_string),
            conflict_retries: 3,
        },
    )
}

// A registered client whose outbound queue the test reads directly.
pub(crate) struct TestClient {
    pub id: ClientId,
    rx: mpsc::Receiver<Utf8Bytes>,
}

impl TestClient {
    // Deliveries are queued before `dispatch` returns, so no waiting is needed.
    pub(crate) fn try_next_event(&mut self) -> Option<Value> {
        let frame = self.rx.try_recv().ok()?;
        Some(serde_json::from_str(frame.as_str()).expect("expected event json"))
    }

    pub(crate) fn next_event(&mut self) -> Value {
        self.try_next_event().expect("expected a queued event")
    }
}

pub(crate) async fn connect(hub: &Hub) -> TestClient {
    let (handle, rx) = ClientHandle::new(32);
    let id = ClientId::new();
    hub.connect(id, handle).await;
    TestClient { id, rx }
}

pub(crate) async fn subscribe(hub: &Hub, client: &TestClient, channel: Channel) {
    hub.dispatch(&client.id, Command::ChannelUpdate { channel })
        .await
        .expect("expected channel update to succeed");
}

// Store whose every operation fails with a backend error.
pub(crate) struct FailingStore;

fn backend_down() -> StoreError {
    StoreError::Backend("backend unavailable".to_string())
}

#[async_trait]
impl CommentStore for FailingStore {
    async fn insert_comment(&self, _comment: &NewComment) -> Result<i64, StoreError> {
        Err(backend_down())
    }

    async fn update_comment_body(&self, _comment_id: i64, _body: &str) -> Result<u64, StoreError> {
        Err(backend_down())
    }

    async fn redact_comment(
        &self,
        _comment_id: i64,
        _redaction: Redaction,
    ) -> Result<u64, StoreError> {
        Err(backend_down())
    }

    async fn delete_comment(&self, _comment_id: i64) -> Result<u64, StoreError> {
        Err(backend_down())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Err(backend_down())
    }

    async fn close(&self) {}
}

// Memory store whose first `conflicts` transactions fail to open with a write conflict.
#[derive(Clone)]
pub(crate) struct ConflictingStore {
    inner: MemoryStore,
    conflicts: u32,
    attempts: Arc<AtomicU32>,
}

impl ConflictingStore {
    pub(crate) fn new(inner: MemoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentStore for ConflictingStore {
    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError> {
        self.inner.insert_comment(comment).await
    }

    async fn update_comment_body(&self, comment_id: i64, body: &str) -> Result<u64, StoreError> {
        self.inner.update_comment_body(comment_id, body).await
    }

    async fn redact_comment(
        &self,
        comment_id: i64,
        redaction: Redaction,
    ) -> Result<u64, StoreError> {
        self.inner.redact_comment(comment_id, redaction).await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<u64, StoreError> {
        self.inner.delete_comment(comment_id).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.conflicts {
            return Err(StoreError::Conflict("Deadlock found".to_string()));
        }
        self.inner.begin().await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
