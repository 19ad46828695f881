//! Database row types. These map directly to SQLite rows and stay independent
//! of the mesh-types API models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_verified: bool,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub avatar: Option<&'a str>,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Default)]
pub struct UserUpdate<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub avatar: Option<&'a str>,
}

pub struct PostRow {
    pub id: String,
    pub author: UserSummaryRow,
    pub content: String,
    pub image_url: Option<String>,
    pub repost_of: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The original post joined onto a repost row.
pub struct OriginalPostRow {
    pub id: String,
    pub author: UserSummaryRow,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

/// A post plus the counters and viewer flags computed in the feed query.
pub struct FeedRow {
    pub post: PostRow,
    pub original: Option<OriginalPostRow>,
    pub like_count: i64,
    pub repost_count: i64,
    pub comment_count: i64,
    pub is_following: bool,
    pub liked_by_viewer: bool,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub author_id: &'a str,
    pub content: &'a str,
    pub image_url: Option<&'a str>,
    pub repost_of: Option<&'a str>,
    pub created_at: &'a str,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author: UserSummaryRow,
    pub text: String,
    pub parent_id: Option<String>,
    pub created_at: String,
}

pub struct NewComment<'a> {
    pub id: &'a str,
    pub post_id: &'a str,
    pub author_id: &'a str,
    pub text: &'a str,
    pub parent_id: Option<&'a str>,
    pub created_at: &'a str,
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub sender: UserSummaryRow,
    pub kind: String,
    pub post_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NewNotification<'a> {
    pub id: &'a str,
    pub recipient_id: &'a str,
    pub sender_id: &'a str,
    pub kind: &'a str,
    pub post_id: Option<&'a str>,
    pub message: &'a str,
    pub created_at: &'a str,
}
