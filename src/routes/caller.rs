use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Caller Router Module
///
/// Routes about the caller themselves. The identity comes from the `x-principal` header;
/// without it the caller is anonymous, has no profile and holds the guest role.
pub fn caller_routes() -> Router<AppState> {
    Router::new()
        // GET/PUT /api/me/profile
        // Saving invalidates the caller's cached profile.
        .route(
            "/api/me/profile",
            get(handlers::get_my_profile).put(handlers::save_my_profile),
        )
        // GET /api/me/role
        .route("/api/me/role", get(handlers::get_my_role))
}
