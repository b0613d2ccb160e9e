//! # nb-api
//!
//! The HTTP routing and orchestration layer for nestboard.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

pub use handlers::AppState;

/// Builds the JSON API.
///
/// The binary mounts the returned router at `/`; tests drive it directly.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Board index
        .route("/board/forums", get(handlers::board_forums))
        .route("/board/forums/{parent_id}", get(handlers::board_forums_under))
        // Forums
        .route("/forum", axum::routing::post(handlers::create_root_forum))
        .route(
            "/forum/{forum_id}",
            get(handlers::forum_stats)
                .post(handlers::create_child_forum)
                .delete(handlers::delete_forum),
        )
        .route("/forum/{forum_id}/permissions", get(handlers::forum_permissions))
        .route(
            "/forum/{forum_id}/topics",
            get(handlers::forum_topics).post(handlers::new_topic),
        )
        .route("/forum/{forum_id}/topics/{page}", get(handlers::forum_topics_page))
        // Topics
        .route("/topic/{topic_id}", get(handlers::topic_info))
        .route("/topic/{topic_id}/permissions", get(handlers::topic_permissions))
        .route(
            "/topic/{topic_id}/posts",
            get(handlers::topic_posts).post(handlers::reply),
        )
        .route("/topic/{topic_id}/posts/{page}", get(handlers::topic_posts_page))
        // Account
        .route("/user", get(handlers::current_user))
        .route("/user/search", get(handlers::search_users))
        .route("/user/{user_id}", get(handlers::user_profile))
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}
