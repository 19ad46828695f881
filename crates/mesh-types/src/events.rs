use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::NotificationView;

/// Events pushed to a client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is registered
    Ready { user_id: Uuid, username: String },

    /// A notification addressed to the connected user
    Notification(NotificationView),
}
