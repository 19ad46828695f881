use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use mesh_db::Database;
use mesh_db::models::UserRow;
use mesh_gateway::ConnectionRegistry;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub registry: Arc<dyn ConnectionRegistry>,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, registry: Arc<dyn ConnectionRegistry>) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            registry,
        })
    }
}

/// Run blocking DB work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

/// Load the acting user, who must still exist.
pub async fn load_user(state: &AppState, user_id: Uuid) -> Result<UserRow, ApiError> {
    blocking(state, move |db| {
        db.get_user_by_id(&user_id.to_string())?
            .ok_or(ApiError::NotFound("User"))
    })
    .await
}
