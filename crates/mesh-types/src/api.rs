use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{FeedMode, NotificationKind};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub follower_count: u64,
    pub following_count: u64,
    /// Whether the requesting user follows this profile.
    pub is_following: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
    pub follower_count: u64,
}

// -- Posts --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepostRequest {
    #[serde(default)]
    pub quote: Option<String>,
}

/// The original post embedded in a repost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepostedPost {
    pub id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub repost: Option<RepostedPost>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post as returned by every listing endpoint, enriched for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: PostView,
    pub like_count: u64,
    pub repost_count: u64,
    pub comment_count: u64,
    pub trending_score: u64,
    pub trending: bool,
    pub is_following: bool,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default, deserialize_with = "lenient_int")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub limit: Option<i64>,
    #[serde(rename = "type", default, deserialize_with = "lenient_mode")]
    pub mode: FeedMode,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "lenient_int")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub limit: Option<i64>,
}

/// Paging values that are not integers count as absent; range clamping is
/// up to the caller.
fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FeedMode, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(FeedMode::from_query).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
    pub posts: Vec<FeedPost>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub like_count: u64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub text: String,
    #[serde(default)]
    pub parent_comment: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: UserSummary,
    pub text: String,
    pub parent_comment: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A comment with its replies nested beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
}

impl Drop for CommentNode {
    // Flatten the subtree first so that dropping a deep reply chain does not
    // recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

// -- Notifications --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender: UserSummary,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
