use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use mesh_types::api::{Claims, NotificationView};

use crate::convert::notification_view;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub.to_string();
    let rows = blocking(&state, move |db| Ok(db.get_notifications(&me)?)).await?;

    let notifications: Vec<NotificationView> = rows.into_iter().filter_map(notification_view).collect();
    Ok(Json(notifications))
}

/// Mark one of the caller's notifications as read. Marking it again is a
/// no-op success.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        let id = notification_id.to_string();
        if !db.mark_notification_read(&id, &me)? {
            return Err(ApiError::NotFound("Notification"));
        }
        db.get_notification(&id)?.ok_or(ApiError::NotFound("Notification"))
    })
    .await?;

    let view = notification_view(row)
        .ok_or_else(|| anyhow::anyhow!("notification {} has an unknown kind", notification_id))?;
    Ok(Json(view))
}
