use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use mesh_db::models::NewPost;
use mesh_db::now_timestamp;
use mesh_types::api::{
    Claims, CreatePostRequest, PageQuery, RepostRequest, SearchQuery, SearchResponse,
    ToggleLikeResponse,
};
use mesh_types::models::NotificationKind;

use crate::convert::{feed_post, parse_uuid, summary_of, user_summary};
use crate::error::ApiError;
use crate::fanout::notify;
use crate::feed::Page;
use crate::state::{AppState, blocking, load_user};

const SEARCH_LIMIT: u32 = 10;
const ALREADY_REPOSTED: &str = "You have already reposted this post";

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.as_deref().map(str::trim).unwrap_or_default().to_string();
    let image_url = req.image_url.filter(|url| !url.trim().is_empty());

    if content.is_empty() && image_url.is_none() {
        return Err(ApiError::validation("Content or image is required"));
    }

    load_user(&state, claims.sub).await?;

    let post_id = Uuid::new_v4();
    let viewer = claims.sub.to_string();
    let post = blocking(&state, move |db| {
        let id = post_id.to_string();
        db.insert_post(&NewPost {
            id: &id,
            author_id: &viewer,
            content: &content,
            image_url: image_url.as_deref(),
            repost_of: None,
            created_at: &now_timestamp(),
        })?;
        db.get_post(&viewer, &id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("post {} vanished after insert", id)))
    })
    .await?;

    info!("{} ({}) created post {}", claims.username, claims.sub, post_id);

    Ok((StatusCode::CREATED, Json(feed_post(post, false))))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = load_user(&state, claims.sub).await?;

    let user_id = claims.sub.to_string();
    let (author_id, liked, like_count) = blocking(&state, move |db| {
        let pid = post_id.to_string();
        let author_id = db.get_post_author(&pid)?.ok_or(ApiError::NotFound("Post"))?;
        let (liked, count) = db.toggle_like(&pid, &user_id)?;
        Ok((author_id, liked, count))
    })
    .await?;

    if liked {
        let recipient = parse_uuid(&author_id, "author id");
        notify(&state, &summary_of(&actor), recipient, NotificationKind::Like, Some(post_id)).await;
    }

    Ok(Json(ToggleLikeResponse { liked, like_count }))
}

pub async fn repost(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(body, _): WithRejection<Option<Json<RepostRequest>>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = load_user(&state, claims.sub).await?;
    let quote = body
        .and_then(|Json(req)| req.quote)
        .map(|q| q.trim().to_string())
        .unwrap_or_default();

    let repost_id = Uuid::new_v4();
    let viewer = claims.sub.to_string();
    let (original_author, row) = blocking(&state, move |db| {
        let original = post_id.to_string();
        let original_author = db
            .get_post_author(&original)?
            .ok_or(ApiError::NotFound("Original post"))?;

        if db.find_repost(&viewer, &original)?.is_some() {
            return Err(ApiError::Conflict(ALREADY_REPOSTED.into()));
        }

        let id = repost_id.to_string();
        db.insert_post(&NewPost {
            id: &id,
            author_id: &viewer,
            content: &quote,
            image_url: None,
            repost_of: Some(&original),
            created_at: &now_timestamp(),
        })
        .map_err(|e| ApiError::conflict_on_duplicate(e, ALREADY_REPOSTED))?;
        let row = db
            .get_post(&viewer, &id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("repost {} vanished after insert", id)))?;
        Ok((original_author, row))
    })
    .await?;

    let recipient = parse_uuid(&original_author, "author id");
    notify(&state, &summary_of(&actor), recipient, NotificationKind::Repost, Some(post_id)).await;

    Ok((StatusCode::CREATED, Json(feed_post(row, false))))
}

pub async fn posts_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::new(query.page, query.limit);
    let viewer = claims.sub.to_string();

    let rows = blocking(&state, move |db| {
        Ok(db.posts_by_author(&viewer, &user_id.to_string(), page.limit, page.offset)?)
    })
    .await?;

    let posts: Vec<_> = rows.into_iter().map(|row| feed_post(row, false)).collect();
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        db.get_post(&viewer, &post_id.to_string())?
            .ok_or(ApiError::NotFound("Post"))
    })
    .await?;

    Ok(Json(feed_post(row, false)))
}

pub async fn search(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let needle = query.q.trim().to_string();
    if needle.is_empty() {
        return Err(ApiError::validation("Search query is required"));
    }

    let viewer = claims.sub.to_string();
    let (users, posts) = blocking(&state, move |db| {
        let users = db.search_users(&needle, SEARCH_LIMIT)?;
        let posts = db.search_posts(&viewer, &needle, SEARCH_LIMIT)?;
        Ok((users, posts))
    })
    .await?;

    Ok(Json(SearchResponse {
        users: users.into_iter().map(user_summary).collect(),
        posts: posts.into_iter().map(|row| feed_post(row, false)).collect(),
    }))
}
