use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use mesh_db::Database;
use mesh_db::models::UserUpdate;
use mesh_types::api::{Claims, FollowResponse, UpdateProfileRequest, UserProfile, UserSummary};
use mesh_types::models::NotificationKind;

use crate::auth::{normalize_email, validate_username};
use crate::convert::{parse_timestamp, parse_uuid, summary_of, user_summary};
use crate::error::ApiError;
use crate::fanout::notify;
use crate::state::{AppState, blocking, load_user};

fn load_profile(db: &Database, viewer: &str, user_id: &str) -> Result<UserProfile, ApiError> {
    let user = db.get_user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
    let (follower_count, following_count) = db.follow_counts(user_id)?;
    let is_following = db.is_following(viewer, user_id)?;

    Ok(UserProfile {
        id: parse_uuid(&user.id, "user id"),
        username: user.username,
        email: user.email,
        avatar: user.avatar,
        is_verified: user.is_verified,
        follower_count,
        following_count,
        is_following,
        created_at: parse_timestamp(&user.created_at),
    })
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub.to_string();
    let profile = blocking(&state, move |db| load_profile(db, &me, &me)).await?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(username) = &req.username {
        validate_username(username)?;
    }
    let email = req.email.as_deref().map(normalize_email).transpose()?;

    let me = claims.sub.to_string();
    let profile = blocking(&state, move |db| {
        db.get_user_by_id(&me)?.ok_or(ApiError::NotFound("User"))?;

        if let Some(username) = &req.username {
            if db.get_user_by_username(username)?.is_some_and(|u| u.id != me) {
                return Err(ApiError::Conflict("Username already taken".into()));
            }
        }
        if let Some(email) = &email {
            if db.get_user_by_email(email)?.is_some_and(|u| u.id != me) {
                return Err(ApiError::Conflict("Email already exists".into()));
            }
        }

        db.update_user(
            &me,
            &UserUpdate {
                username: req.username.as_deref(),
                email: email.as_deref(),
                avatar: req.avatar.as_deref(),
            },
        )
        .map_err(|e| ApiError::conflict_on_duplicate(e, "Username or email already exists"))?;
        load_profile(db, &me, &me)
    })
    .await?;

    info!("{} updated their profile", claims.sub);
    Ok(Json(profile))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let profile = blocking(&state, move |db| load_profile(db, &viewer, &user_id.to_string())).await?;
    Ok(Json(profile))
}

/// Follow or unfollow `user_id`. Only a new follow notifies.
pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::validation("Cannot follow yourself"));
    }

    let actor = load_user(&state, claims.sub).await?;

    let follower = claims.sub.to_string();
    let (following, follower_count) = blocking(&state, move |db| {
        let target = user_id.to_string();
        db.get_user_by_id(&target)?.ok_or(ApiError::NotFound("User"))?;
        let following = db.toggle_follow(&follower, &target)?;
        let (follower_count, _) = db.follow_counts(&target)?;
        Ok((following, follower_count))
    })
    .await?;

    if following {
        notify(&state, &summary_of(&actor), user_id, NotificationKind::Follow, None).await;
    }

    Ok(Json(FollowResponse {
        following,
        follower_count,
    }))
}

pub async fn get_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| {
        let id = user_id.to_string();
        db.get_user_by_id(&id)?.ok_or(ApiError::NotFound("User"))?;
        Ok(db.get_followers(&id)?)
    })
    .await?;

    let users: Vec<UserSummary> = users.into_iter().map(user_summary).collect();
    Ok(Json(users))
}

pub async fn get_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, move |db| {
        let id = user_id.to_string();
        db.get_user_by_id(&id)?.ok_or(ApiError::NotFound("User"))?;
        Ok(db.get_following(&id)?)
    })
    .await?;

    let users: Vec<UserSummary> = users.into_iter().map(user_summary).collect();
    Ok(Json(users))
}
