use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints for any signed-in account. Handlers receive the resolved
/// `AuthUser` placed in the request extensions by the gate.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /api/user/profile
        // The caller's own profile and display name.
        .route(
            "/api/user/profile",
            get(handlers::account::get_profile).put(handlers::account::update_profile),
        )
}
