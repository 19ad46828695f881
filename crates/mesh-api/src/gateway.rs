use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use mesh_gateway::connection;

use crate::error::ApiError;
use crate::middleware::decode_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: String,
}

/// Upgrade to the notification WebSocket. The JWT travels in the query
/// string because browsers cannot set headers on WebSocket requests.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<GatewayQuery>, ApiError>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&state.jwt_secret, &query.token).ok_or(ApiError::Unauthorized)?;
    let registry = state.registry.clone();

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, registry, claims.sub, claims.username)
    }))
}
