use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Account lifecycle management. Reachable only by callers whose stored role
/// is `admin`; everyone else gets 403, and callers without a valid session 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/users
        // Every account, including those still awaiting approval.
        .route("/api/admin/users", get(handlers::admin::list_users))
        // POST /api/admin/approve {id}
        .route("/api/admin/approve", post(handlers::admin::approve_user))
        // POST /api/admin/reject {id}
        // Rejection removes the account.
        .route("/api/admin/reject", post(handlers::admin::reject_user))
        // POST /api/admin/delete {id}
        .route("/api/admin/delete", post(handlers::admin::delete_user))
}
