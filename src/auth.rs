use std::collections::HashSet;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Role, UserProfile},
    repository::RepositoryState,
};

/// How long an issued session token stays valid.
pub const TOKEN_TTL_HOURS: i64 = 72;

/// Claims
///
/// Payload of a session token. Tokens are stateless: nothing about them is
/// persisted, so a token stays cryptographically valid until `exp` even if the
/// account changes. The `AuthUser` extractor closes that gap by re-reading the
/// account on every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the account id.
    pub sub: Uuid,
    pub email: String,
    /// Role at issue time.
    pub role: Role,
    /// Issued At, seconds since the epoch.
    pub iat: i64,
    /// Expiration Time, seconds since the epoch.
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ApiError::Internal(msg),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

/// TokenService
///
/// Issues and verifies HS256 session tokens with one process-wide secret. There
/// is no rotation and no revocation list.
#[derive(Clone)]
pub struct TokenService {
    secret_present: bool,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            secret_present: !secret.is_empty(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, sub: Uuid, email: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(sub, email, role, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        sub: Uuid,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if !self.secret_present {
            return Err(TokenError::Signing("signing key unavailable".to_string()));
        }
        let claims = Claims {
            sub,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies signature and shape, then checks expiry against `now` with no
    /// leeway. A token is dead at exactly `exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

// --- Passwords ---

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored PHC string. A corrupt hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

// --- Request Identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request: token claims checked
/// against the account as it is stored right now.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Current stored role, not the role baked into the token.
    pub role: Role,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AuthUser> for UserProfile {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            approved: user.approved,
            created_at: user.created_at,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved by the gate middleware.
/// 2. Extracts `Authorization: Bearer <token>` and verifies it.
/// 3. Looks the account up so deleted accounts stop working immediately.
///
/// Rejection: `ApiError::Unauthorized` (401) on any authentication failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("authorization required"))?;

        let claims = tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::from(e)
        })?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("account no longer exists"))?;

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            approved: user.approved,
            created_at: user.created_at,
        })
    }
}

// --- Role Gate ---

/// RolePolicy
///
/// The capability a route group requires, expressed as a predicate over the
/// caller's role.
pub trait RolePolicy: Send + Sync + 'static {
    const NAME: &'static str;

    fn permits(role: Role) -> bool;
}

/// Any authenticated account.
pub struct AnyUser;

impl RolePolicy for AnyUser {
    const NAME: &'static str = "user";

    fn permits(_role: Role) -> bool {
        true
    }
}

/// Administrators only.
pub struct AdminOnly;

impl RolePolicy for AdminOnly {
    const NAME: &'static str = "admin";

    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// require_role
///
/// The single access gate. Authentication failures reject with 401 through
/// the `AuthUser` extractor; an authenticated caller whose role fails `P`
/// gets 403. On success the identity is stored in the request extensions for
/// the handlers downstream.
pub async fn require_role<P: RolePolicy>(
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !P::permits(user.role) {
        tracing::warn!(user_id = %user.id, required = P::NAME, "role check failed");
        return Err(ApiError::Forbidden("access denied".to_string()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
