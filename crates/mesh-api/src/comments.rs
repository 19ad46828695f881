use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::warn;
use uuid::Uuid;

use mesh_db::models::NewComment;
use mesh_db::now_timestamp;
use mesh_types::api::{Claims, CreateCommentRequest};

use crate::comment_tree::build_comment_tree;
use crate::convert::{comment_view, parse_uuid, summary_of};
use crate::error::ApiError;
use crate::fanout::{comment_recipients, fan_out};
use crate::mentions::extract_mentions;
use crate::state::{AppState, blocking, load_user};

/// Deepest allowed reply level; a top-level comment is level 1.
pub const MAX_REPLY_DEPTH: u32 = 64;

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("Comment text is required"));
    }

    let actor = load_user(&state, claims.sub).await?;
    let mentions = extract_mentions(&text);

    let comment_id = Uuid::new_v4();
    let author_id = claims.sub.to_string();
    let parent = req.parent_comment;

    let (post_author, parent_author, row) = blocking(&state, move |db| {
        let pid = post_id.to_string();
        let post_author = db.get_post_author(&pid)?.ok_or(ApiError::NotFound("Post"))?;

        let parent_author = match parent {
            Some(parent_id) => {
                let parent_id = parent_id.to_string();
                let parent = db
                    .get_comment(&parent_id)?
                    .ok_or(ApiError::NotFound("Parent comment"))?;
                if parent.post_id != pid {
                    return Err(ApiError::validation("Parent comment belongs to another post"));
                }
                if db.comment_chain_len(&parent_id, MAX_REPLY_DEPTH)? >= MAX_REPLY_DEPTH {
                    return Err(ApiError::validation(format!(
                        "Replies cannot be nested more than {} levels deep",
                        MAX_REPLY_DEPTH
                    )));
                }
                Some(parent.author.id)
            }
            None => None,
        };

        let id = comment_id.to_string();
        let parent_id = parent.map(|p| p.to_string());
        db.insert_comment(&NewComment {
            id: &id,
            post_id: &pid,
            author_id: &author_id,
            text: &text,
            parent_id: parent_id.as_deref(),
            created_at: &now_timestamp(),
        })?;

        let row = db
            .get_comment(&id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("comment {} vanished after insert", id)))?;
        Ok((post_author, parent_author, row))
    })
    .await?;

    let mentioned = resolve_mentions(&state, mentions).await;
    let recipients = comment_recipients(
        claims.sub,
        parse_uuid(&post_author, "author id"),
        parent_author.as_deref().map(|a| parse_uuid(a, "author id")),
        &mentioned,
    );
    fan_out(&state, &summary_of(&actor), Some(post_id), recipients).await;

    Ok((StatusCode::CREATED, Json(comment_view(row))))
}

/// Ids of the mentioned users that exist. The comment is already stored, so
/// a failed lookup only costs the mention notifications.
async fn resolve_mentions(state: &AppState, usernames: Vec<String>) -> Vec<Uuid> {
    if usernames.is_empty() {
        return Vec::new();
    }

    match blocking(state, move |db| Ok(db.get_users_by_usernames(&usernames)?)).await {
        Ok(users) => users.iter().map(|u| parse_uuid(&u.id, "user id")).collect(),
        Err(e) => {
            warn!("Failed to resolve mentions: {:?}", e);
            Vec::new()
        }
    }
}

pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, move |db| {
        let pid = post_id.to_string();
        if db.get_post_author(&pid)?.is_none() {
            return Err(ApiError::NotFound("Post"));
        }
        Ok(db.get_comments_for_post(&pid)?)
    })
    .await?;

    let tree = build_comment_tree(rows.into_iter().map(comment_view).collect())
        .map_err(|e| anyhow::Error::new(e).context(format!("malformed comment tree on post {}", post_id)))?;

    Ok(Json(tree))
}
