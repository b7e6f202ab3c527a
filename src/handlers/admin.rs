use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ValidJson},
    models::{MessageResponse, UserIdRequest, UserProfile},
    repository::RepoError,
};

/// list_users
///
/// [Admin Route] Every account, oldest first. Password hashes never leave the
/// store layer.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Accounts", body = [UserProfile]),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
        (status = 403, description = "Forbidden", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

/// approve_user
///
/// [Admin Route] Sets the approved flag on an account.
#[utoipa::path(
    post,
    path = "/api/admin/approve",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 400, description = "Malformed id", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown account", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_user(
    State(state): State<AppState>,
    admin: AuthUser,
    ValidJson(payload): ValidJson<UserIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = payload.parse()?;
    state.repo.approve_user(id).await.map_err(account_error)?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "account approved");
    Ok(Json(MessageResponse::new("user approved")))
}

/// reject_user
///
/// [Admin Route] Rejects a pending account. Rejection is a hard delete.
#[utoipa::path(
    post,
    path = "/api/admin/reject",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Rejected", body = MessageResponse),
        (status = 400, description = "Malformed id", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown account", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_user(
    State(state): State<AppState>,
    admin: AuthUser,
    ValidJson(payload): ValidJson<UserIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = payload.parse()?;
    state.repo.delete_user(id).await.map_err(account_error)?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "account rejected");
    Ok(Json(MessageResponse::new("user rejected")))
}

/// delete_user
///
/// [Admin Route] Removes an account outright.
#[utoipa::path(
    post,
    path = "/api/admin/delete",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Malformed id", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown account", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    ValidJson(payload): ValidJson<UserIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = payload.parse()?;
    state.repo.delete_user(id).await.map_err(account_error)?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "account deleted");
    Ok(Json(MessageResponse::new("user deleted")))
}

fn account_error(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("user not found"),
        other => other.into(),
    }
}
