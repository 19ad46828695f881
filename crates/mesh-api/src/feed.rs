use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use mesh_db::{Database, format_timestamp};
use mesh_types::api::{Claims, FeedPost, FeedQuery};
use mesh_types::models::FeedMode;

use crate::convert::feed_post;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Trending only considers posts this recent.
pub fn trending_window() -> Duration {
    Duration::hours(24)
}

/// Offset pagination from the 1-based `page` and `limit` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = limit
            .filter(|l| *l > 0)
            .map_or(DEFAULT_PAGE_SIZE, |l| l.min(MAX_PAGE_SIZE as i64) as u32);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// Build one page of the viewer's feed.
pub fn compose_feed(
    db: &Database,
    viewer: Uuid,
    mode: FeedMode,
    page: Page,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<FeedPost>> {
    let viewer = viewer.to_string();

    let rows = match mode {
        FeedMode::Following => db.following_feed(&viewer, page.limit, page.offset)?,
        FeedMode::Trending => {
            let since = format_timestamp(now - trending_window());
            db.trending_feed(&viewer, &since, page.limit, page.offset)?
        }
    };

    let trending = mode == FeedMode::Trending;
    Ok(rows.into_iter().map(|row| feed_post(row, trending)).collect())
}

pub async fn fetch_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<FeedQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::new(query.page, query.limit);
    let mode = query.mode;

    let posts = blocking(&state, move |db| {
        Ok(compose_feed(db, claims.sub, mode, page, Utc::now())?)
    })
    .await?;

    Ok(Json(posts))
}
