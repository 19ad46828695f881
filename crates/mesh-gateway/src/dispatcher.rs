use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use mesh_types::events::GatewayEvent;

use crate::ConnectionRegistry;

/// In-process connection registry backed by unbounded mpsc channels.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }

    pub async fn connected_count(&self) -> usize {
        self.inner.user_channels.read().await.len()
    }
}

#[async_trait]
impl ConnectionRegistry for Dispatcher {
    async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.inner.user_channels.write().await.insert(user_id, (conn_id, tx));
        if let Some((old_conn, _)) = previous {
            debug!("Connection {} for {} replaced by {}", old_conn, user_id, conn_id);
        }
        (conn_id, rx)
    }

    async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    async fn push(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::Ready {
            user_id,
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn push_without_connection_is_dropped() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.push(Uuid::new_v4(), ready(Uuid::nil())).await);
    }

    #[tokio::test]
    async fn last_connection_wins() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();

        let (first_conn, mut first_rx) = dispatcher.register(user).await;
        let (_second_conn, mut second_rx) = dispatcher.register(user).await;

        assert!(dispatcher.push(user, ready(user)).await);
        assert!(second_rx.try_recv().is_ok());
        // The replaced sender was dropped, so the old receiver is closed.
        assert!(first_rx.recv().await.is_none());

        // A stale disconnect must not evict the newer connection.
        dispatcher.unregister(user, first_conn).await;
        assert!(dispatcher.is_connected(user).await);
        assert_eq!(dispatcher.connected_count().await, 1);
    }

    #[tokio::test]
    async fn unregister_removes_current_connection() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (conn, _rx) = dispatcher.register(user).await;

        dispatcher.unregister(user, conn).await;
        assert!(!dispatcher.is_connected(user).await);
        assert!(!dispatcher.push(user, ready(user)).await);
    }
}
