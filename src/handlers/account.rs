use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{AuthUser, hash_password, verify_password},
    error::{ApiError, ValidJson},
    models::{
        AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, User, UserProfile,
    },
    repository::RepoError,
};

// Same message for unknown email and wrong password.
const BAD_CREDENTIALS: &str = "invalid email or password";

/// register
///
/// [Public Route] Creates an account and signs the caller in. New accounts are
/// plain users awaiting approval.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid body", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let user = User::new(
        payload.name.trim().to_string(),
        payload.email.trim().to_string(),
        password_hash,
    );

    let user = match state.repo.create_user(user).await {
        Ok(user) => user,
        Err(RepoError::Conflict(_)) => {
            return Err(ApiError::Conflict("email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    tracing::info!(user_id = %user.id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile::from(&user),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a session token. The token carries
/// the role stored on the account.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

/// get_profile
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(user: AuthUser) -> Json<UserProfile> {
    Json(user.into())
}

/// update_profile
///
/// [Authenticated Route] Changes the caller's display name.
#[utoipa::path(
    put,
    path = "/api/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Missing name", body = crate::error::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let account = state.repo.update_user_name(user.id, name).await?;
    Ok(Json(UserProfile::from(&account)))
}
