//! Row -> API model conversion. Corrupt stored values are logged and
//! replaced with defaults instead of failing the whole listing.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use mesh_db::models::{CommentRow, FeedRow, NotificationRow, UserRow, UserSummaryRow};
use mesh_types::api::{
    CommentView, FeedPost, NotificationView, PostView, RepostedPost, UserSummary,
};

pub fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: parse_uuid(&row.id, "user id"),
        username: row.username,
        avatar: row.avatar,
    }
}

/// Summary of a full user row, used as the sender of notifications.
pub fn summary_of(user: &UserRow) -> UserSummary {
    UserSummary {
        id: parse_uuid(&user.id, "user id"),
        username: user.username.clone(),
        avatar: user.avatar.clone(),
    }
}

pub fn feed_post(row: FeedRow, trending: bool) -> FeedPost {
    let like_count = row.like_count.max(0) as u64;
    let repost_count = row.repost_count.max(0) as u64;

    let repost = row.original.map(|o| RepostedPost {
        id: parse_uuid(&o.id, "post id"),
        author: user_summary(o.author),
        content: o.content,
        image_url: o.image_url,
        created_at: parse_timestamp(&o.created_at),
    });

    FeedPost {
        post: PostView {
            id: parse_uuid(&row.post.id, "post id"),
            author: user_summary(row.post.author),
            content: row.post.content,
            image_url: row.post.image_url,
            repost,
            created_at: parse_timestamp(&row.post.created_at),
            updated_at: parse_timestamp(&row.post.updated_at),
        },
        like_count,
        repost_count,
        comment_count: row.comment_count.max(0) as u64,
        trending_score: like_count + repost_count,
        trending,
        is_following: row.is_following,
        liked_by_viewer: row.liked_by_viewer,
    }
}

pub fn comment_view(row: CommentRow) -> CommentView {
    CommentView {
        id: parse_uuid(&row.id, "comment id"),
        post_id: parse_uuid(&row.post_id, "post id"),
        author: user_summary(row.author),
        text: row.text,
        parent_comment: row.parent_id.as_deref().map(|p| parse_uuid(p, "parent comment id")),
        created_at: parse_timestamp(&row.created_at),
    }
}

/// Returns None for rows with an unknown kind.
pub fn notification_view(row: NotificationRow) -> Option<NotificationView> {
    let kind = match row.kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            warn!("Skipping notification '{}': {}", row.id, e);
            return None;
        }
    };

    Some(NotificationView {
        id: parse_uuid(&row.id, "notification id"),
        recipient_id: parse_uuid(&row.recipient_id, "recipient id"),
        sender: user_summary(row.sender),
        kind,
        post_id: row.post_id.as_deref().map(|p| parse_uuid(p, "post id")),
        message: row.message,
        is_read: row.is_read,
        created_at: parse_timestamp(&row.created_at),
    })
}
