// Fan-out of encoded events to a subscriber snapshot.

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::use_cases::registry::{ClientRegistry, Subscriber};

pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Queues `frame` for every target and returns how many accepted it.
    ///
    /// A target whose queue is closed or full is closed and evicted; the rest are unaffected.
    /// Runs without the registry lock, so targets may already be gone.
    pub async fn deliver(&self, frame: Utf8Bytes, targets: Vec<Subscriber>) -> usize {
        let mut delivered = 0;
        for target in targets {
            match target.handle.deliver(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(conn_id = %target.id, error = %err, "delivery failed; evicting client");
                    target.handle.close();
                    if self.registry.deregister(&target.id).await.is_none() {
                        debug!(conn_id = %target.id, "client already deregistered");
                    }
                }
            }
        }
        delivered
    }
}
