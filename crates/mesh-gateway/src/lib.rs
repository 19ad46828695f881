pub mod connection;
pub mod dispatcher;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use mesh_types::events::GatewayEvent;

/// Live per-user push channels.
///
/// One active channel per user: registering again replaces the previous
/// channel, so the most recent connection receives pushes.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Register a channel for `user_id`. Returns (conn_id, receiver).
    async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>);

    /// Drop the channel, but only if `conn_id` still owns it.
    async fn unregister(&self, user_id: Uuid, conn_id: Uuid);

    /// Best-effort push. Returns true if a live channel accepted the event.
    async fn push(&self, user_id: Uuid, event: GatewayEvent) -> bool;
}
