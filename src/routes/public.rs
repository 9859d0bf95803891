use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read routes over published notices. Drafts never appear here unless the remote service
/// decides the caller may see them (`/api/posts/{id}` for an admin).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe. Does not touch the remote service.
        .route("/health", get(|| async { "ok" }))
        // GET /api/home
        // The twelve newest published notices.
        .route("/api/home", get(handlers::get_home))
        // GET /api/category/{type}?sort=&organization=&tag=&year=
        // Category listing with facets. Non-canonical queries are redirected.
        .route("/api/category/{type}", get(handlers::get_category))
        // GET /api/search?q=&sort=&organization=&tag=&year=
        .route("/api/search", get(handlers::search))
        // GET /api/posts/{id}
        .route("/api/posts/{id}", get(handlers::get_post))
        // POST /api/listing/navigate
        // Pure URL computation: current location + filter change -> canonical href.
        .route("/api/listing/navigate", post(handlers::navigate))
}
