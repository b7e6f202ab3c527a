use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Largest accepted upload body.
const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Accounts ---
        .route("/api/register", post(handlers::account::register))
        .route("/api/login", post(handlers::account::login))
        // --- Kanban ---
        .route(
            "/api/boards",
            get(handlers::kanban::list_boards).post(handlers::kanban::create_board),
        )
        .route("/api/boards/{id}", delete(handlers::kanban::delete_board))
        .route(
            "/api/statuses",
            get(handlers::kanban::list_statuses).post(handlers::kanban::create_status),
        )
        .route("/api/statuses/{id}", delete(handlers::kanban::delete_status))
        .route(
            "/api/cards",
            get(handlers::kanban::list_cards).post(handlers::kanban::create_card),
        )
        .route(
            "/api/cards/{id}",
            put(handlers::kanban::update_card).delete(handlers::kanban::delete_card),
        )
        // --- Uploads ---
        // POST /api/upload
        // Multipart form with a `file` field. The default 2MB body cap is raised
        // for this route only.
        .route(
            "/api/upload",
            post(handlers::uploads::upload_file).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        // GET /api/cleanup
        // Runs an orphaned upload sweep on demand.
        .route("/api/cleanup", get(handlers::uploads::cleanup_uploads))
        // --- Wiki ---
        .route(
            "/api/wiki/pages",
            get(handlers::wiki::list_pages).post(handlers::wiki::create_page),
        )
        .route(
            "/api/wiki/pages/{id}",
            get(handlers::wiki::get_page)
                .put(handlers::wiki::update_page)
                .delete(handlers::wiki::delete_page),
        )
}
