// The channel hub: registry, broadcaster and store shared by every connection worker.

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::{Channel, CommentStore, Event};
use crate::interface_adapters::protocol::encode_event;
use crate::use_cases::broadcaster::Broadcaster;
use crate::use_cases::registry::{ClientHandle, ClientId, ClientRegistry, ClientState};

/// Policy knobs for command handling.
#[derive(Debug, Clone, Default)]
pub struct HubSettings {
    /// Invoker id allowed to issue admin and full deletions; `None` disables both.
    pub admin_id: Option<String>,
    /// Extra attempts for a toggle that lost a write conflict.
    pub conflict_retries: u32,
}

pub struct Hub {
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) store: Arc<dyn CommentStore>,
    pub(crate) settings: HubSettings,
}

impl Hub {
    pub fn new(store: Arc<dyn CommentStore>, settings: HubSettings) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Registers a freshly upgraded connection with no subscription.
    pub async fn connect(&self, id: ClientId, handle: ClientHandle) {
        self.registry.register(ClientState::new(id, handle)).await;
    }

    /// Removes a connection; returns false if it had already been evicted.
    pub async fn disconnect(&self, id: &ClientId) -> bool {
        self.registry.deregister(id).await.is_some()
    }

    /// Encodes `event` once and delivers it to the channel's current subscribers.
    pub async fn publish(&self, channel: Channel, event: Event) -> usize {
        let frame = match encode_event(&event) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                error!(error = %e, action = event.action(), "failed to encode event");
                return 0;
            }
        };

        let targets = self.registry.subscribers(&channel).await;
        let audience = targets.len();
        let delivered = self.broadcaster.deliver(frame, targets).await;
        debug!(
            %channel,
            action = event.action(),
            audience,
            delivered,
            "event broadcast"
        );
        delivered
    }

    pub(crate) fn is_admin(&self, invoker_id: &str) -> bool {
        self.settings.admin_id.as_deref() == Some(invoker_id)
    }

    // Asks every connection worker to close its socket.
    pub async fn close_all(&self) {
        let clients = self.registry.all().await;
        info!(clients = clients.len(), "closing client connections");
        for client in clients {
            client.handle.close();
        }
    }

    /// Closes every connection, waits up to `grace` for the workers to leave, then releases the
    /// store.
    pub async fn shutdown(&self, grace: Duration) {
        self.close_all().await;

        if tokio::time::timeout(grace, self.registry.wait_until_empty())
            .await
            .is_err()
        {
            warn!(
                remaining = self.registry.len().await,
                "connections still open after shutdown grace period"
            );
        }

        self.store.close().await;
        info!("store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostType;
    use crate::interface_adapters::store::MemoryStore;
    use crate::use_cases::test_support::{connect, hub_with, subscribe};

    #[tokio::test]
    async fn when_channel_has_no_subscribers_then_publish_delivers_nothing() {
        let hub = hub_with(Arc::new(MemoryStore::new()), None);
        let mut lurker = connect(&hub).await;

        let delivered = hub
            .publish(
                Channel::new(PostType::Blog, 1),
                Event::PostLike {
                    liker_id: "u1".to_string(),
                    change: 1,
                },
            )
            .await;

        assert_eq!(delivered, 0);
        assert!(lurker.try_next_event().is_none());
    }

    #[tokio::test]
    async fn when_hub_shuts_down_then_workers_are_signalled_and_drained() {
        let hub = Arc::new(hub_with(Arc::new(MemoryStore::new()), None));
        let (handle, _rx) = ClientHandle::new(4);
        let id = ClientId::new();
        let signal = handle.shutdown_signal();
        hub.connect(id, handle).await;

        // Stand-in connection worker: leaves the hub once told to close.
        let worker = tokio::spawn({
            let hub = hub.clone();
            async move {
                signal.notified().await;
                hub.disconnect(&id).await
            }
        });

        tokio::time::timeout(Duration::from_secs(1), hub.shutdown(Duration::from_secs(1)))
            .await
            .expect("expected shutdown to finish");

        assert!(worker.await.expect("expected worker to finish"));
        assert!(hub.registry().is_empty().await);
    }

    #[tokio::test]
    async fn when_workers_never_leave_then_shutdown_gives_up_after_grace() {
        let hub = hub_with(Arc::new(MemoryStore::new()), None);
        let client = connect(&hub).await;
        subscribe(&hub, &client, Channel::new(PostType::Project, 3)).await;

        hub.shutdown(Duration::from_millis(20)).await;

        assert_eq!(hub.registry().len().await, 1);
    }
}
