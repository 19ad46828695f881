use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, comments, feed, gateway, notifications, posts, users};

/// All HTTP and WebSocket routes. Cross-cutting layers (CORS, tracing) are
/// added by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/gateway", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        .route("/api/user/me", get(users::get_me).put(users::update_me))
        .route("/api/user/{user_id}", get(users::get_user))
        .route("/api/user/{user_id}/follow", post(users::toggle_follow))
        .route("/api/user/{user_id}/followers", get(users::get_followers))
        .route("/api/user/{user_id}/following", get(users::get_following))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/feed", get(feed::fetch_feed))
        .route("/api/posts/search", get(posts::search))
        .route("/api/posts/user/{user_id}", get(posts::posts_by_user))
        .route("/api/posts/{post_id}", get(posts::get_post))
        .route("/api/posts/{post_id}/like", post(posts::toggle_like))
        .route(
            "/api/posts/{post_id}/comments",
            get(comments::get_comments).post(comments::add_comment),
        )
        .route("/api/posts/{post_id}/repost", post(posts::repost))
        .route("/api/notifications", get(notifications::get_notifications))
        .route("/api/notifications/{notification_id}/read", patch(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
