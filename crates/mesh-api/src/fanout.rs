use tracing::{debug, warn};
use uuid::Uuid;

use mesh_db::models::NewNotification;
use mesh_db::now_timestamp;
use mesh_types::api::{NotificationView, UserSummary};
use mesh_types::events::GatewayEvent;
use mesh_types::models::NotificationKind;

use crate::convert::parse_timestamp;
use crate::state::{AppState, blocking};

/// Recipients for a new comment, at most one notification each.
///
/// The post author hears about the comment, the parent author about the
/// reply, and mentioned users about the mention, in that priority. The
/// commenter is never notified.
pub fn comment_recipients(
    actor: Uuid,
    post_author: Uuid,
    parent_author: Option<Uuid>,
    mentioned: &[Uuid],
) -> Vec<(Uuid, NotificationKind)> {
    let mut recipients: Vec<(Uuid, NotificationKind)> = Vec::new();
    let mut add = |user: Uuid, kind: NotificationKind| {
        if user != actor && !recipients.iter().any(|(u, _)| *u == user) {
            recipients.push((user, kind));
        }
    };

    add(post_author, NotificationKind::Comment);
    if let Some(parent_author) = parent_author {
        add(parent_author, NotificationKind::Reply);
    }
    for &user in mentioned {
        add(user, NotificationKind::Mention);
    }

    recipients
}

/// Persist a notification for each recipient, then push it to the live
/// channel if the recipient is connected.
///
/// Never fails: a notification that cannot be stored or delivered is logged
/// and skipped, the triggering action already succeeded. Self-notifications
/// are dropped. Returns the notifications that were stored.
pub async fn fan_out(
    state: &AppState,
    sender: &UserSummary,
    post_id: Option<Uuid>,
    recipients: Vec<(Uuid, NotificationKind)>,
) -> Vec<NotificationView> {
    let mut stored = Vec::with_capacity(recipients.len());

    for (recipient_id, kind) in recipients {
        if recipient_id == sender.id {
            continue;
        }

        let view = NotificationView {
            id: Uuid::new_v4(),
            recipient_id,
            sender: sender.clone(),
            kind,
            post_id,
            message: kind.message(&sender.username),
            is_read: false,
            created_at: Default::default(),
        };

        let view = match persist(state, view).await {
            Ok(view) => view,
            Err(e) => {
                warn!("Failed to store {} notification for {}: {}", kind, recipient_id, e);
                continue;
            }
        };

        let delivered = state
            .registry
            .push(recipient_id, GatewayEvent::Notification(view.clone()))
            .await;
        debug!("{} notification {} for {} (live: {})", kind, view.id, recipient_id, delivered);

        stored.push(view);
    }

    stored
}

/// Single-recipient convenience for like, repost and follow.
pub async fn notify(
    state: &AppState,
    sender: &UserSummary,
    recipient_id: Uuid,
    kind: NotificationKind,
    post_id: Option<Uuid>,
) -> Option<NotificationView> {
    fan_out(state, sender, post_id, vec![(recipient_id, kind)])
        .await
        .into_iter()
        .next()
}

async fn persist(
    state: &AppState,
    mut view: NotificationView,
) -> Result<NotificationView, crate::error::ApiError> {
    blocking(state, move |db| {
        let created_at = now_timestamp();
        db.insert_notification(&NewNotification {
            id: &view.id.to_string(),
            recipient_id: &view.recipient_id.to_string(),
            sender_id: &view.sender.id.to_string(),
            kind: view.kind.as_str(),
            post_id: view.post_id.map(|p| p.to_string()).as_deref(),
            message: &view.message,
            created_at: &created_at,
        })?;
        view.created_at = parse_timestamp(&created_at);
        Ok(view)
    })
    .await
}
