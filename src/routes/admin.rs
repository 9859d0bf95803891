use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Every handler here extracts `AdminSession`: an unresolved role answers 503, a denied
/// one 403 with the fixed access-denied body, and the handler body never runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/posts lists every notice, drafts included.
        // POST /admin/posts creates a draft.
        .route(
            "/posts",
            get(handlers::list_admin_posts).post(handlers::create_post),
        )
        .route(
            "/posts/{id}",
            get(handlers::get_admin_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/{id}/publish", post(handlers::publish_post))
        .route("/posts/{id}/unpublish", post(handlers::unpublish_post))
        // POST /admin/roles
        // The remote service re-checks the caller's authority for role changes.
        .route("/roles", post(handlers::assign_role))
}
