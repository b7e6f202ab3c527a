use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;

// --- Identity ---

/// Role
///
/// The RBAC field carried by both the stored account and the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// User
///
/// The stored account record. Never serialized directly: the password hash must
/// not leave the server, so responses go through `UserProfile`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Unique across all accounts.
    pub email: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role: Role::User,
            approved: false,
            created_at: Utc::now(),
        }
    }
}

/// UserProfile
///
/// Public view of an account, returned by login, profile and admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub approved: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            approved: user.approved,
            created_at: user.created_at,
        }
    }
}

// --- Kanban ---

/// Board
///
/// Top-level kanban container. Owns its statuses and cards by `boardId`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Board {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status
///
/// A board column. Cards point at it through `statusId`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Status {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Status {
    pub fn new(board_id: Uuid, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            board_id,
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Card
///
/// A kanban card. `status_id` is `None` when the card sits outside any column,
/// including after its column was deleted. `image` holds a public upload path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub board_id: Uuid,
    pub status_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub color: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    // RFC3339 string, kept as sent by the client.
    pub due_date: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(req: CardRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            board_id: req.board_id,
            status_id: req.status_id,
            title: req.title,
            description: req.description,
            color: req.color,
            image: req.image,
            tags: normalize_tags(req.tags),
            due_date: req.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces every mutable field. Identity and creation time survive.
    pub fn replace(&self, req: CardRequest) -> Self {
        Self {
            id: self.id,
            created_at: self.created_at,
            updated_at: Utc::now(),
            ..Card::new(req)
        }
    }
}

/// Tags form a set: trimmed, stripped of a leading `#`, de-duplicated in order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// CardFilter
///
/// Query parameters accepted by `GET /api/cards`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CardFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub board_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tag: Option<String>,
}

/// BoardFilter
///
/// Query parameters accepted by `GET /api/statuses`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BoardFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub board_id: Option<Uuid>,
}

// --- Wiki ---

/// WikiPage
///
/// A node in the wiki tree. Root pages have no `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WikiPage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub emoji: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl WikiPage {
    pub fn new(req: CreatePageRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id: req.parent_id,
            title: req.title.trim().to_string(),
            content: req.content,
            emoji: req.emoji,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the whitelisted fields of a patch and bumps `updated_at`.
    pub fn apply(&mut self, patch: UpdatePageRequest) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(emoji) = patch.emoji {
            self.emoji = emoji;
        }
        self.updated_at = Utc::now();
    }
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateBoardRequest {
    #[serde(default)]
    pub name: String,
}

impl CreateBoardRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateStatusRequest {
    pub board_id: Uuid,
    #[serde(default)]
    pub name: String,
}

impl CreateStatusRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("name", &self.name)
    }
}

/// CardRequest
///
/// Full card body used for both creation and replacement. Empty strings for
/// `statusId`, `image` and `dueDate` mean "unset".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CardRequest {
    pub board_id: Uuid,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub due_date: Option<String>,
}

impl CardRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePageRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub emoji: String,
}

impl CreatePageRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("title", &self.title)
    }
}

/// UpdatePageRequest
///
/// The only fields a wiki update may touch. Anything else in the body is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl UpdatePageRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.title {
            Some(title) => require_text("title", title),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("name", &self.name)?;
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::validation("email must be a valid address"));
        }
        if self.password.chars().count() < 8 {
            return Err(ApiError::validation(
                "password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: String,
}

/// UserIdRequest
///
/// Body of the admin lifecycle endpoints. The id arrives as a string so a
/// malformed value can be reported as a validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserIdRequest {
    pub id: String,
}

impl UserIdRequest {
    pub fn parse(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(self.id.trim()).map_err(|_| ApiError::validation("invalid user id"))
    }
}

// --- Response Bodies ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// DeleteResponse
///
/// Successful delete. `cascade` is `"partial"` when dependent records could
/// not all be cleaned up; `failures` then lists what went wrong.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl From<DeleteOutcome> for DeleteResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        let cascade = (!outcome.is_complete()).then(|| "partial".to_string());
        Self {
            status: "deleted".to_string(),
            cascade,
            failures: outcome.cascade_failures,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// DeleteOutcome
///
/// Result of a delete whose primary record is gone. Cascade steps run after the
/// primary delete and their failures are collected here instead of aborting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    pub cascade_failures: Vec<String>,
}

impl DeleteOutcome {
    pub fn is_complete(&self) -> bool {
        self.cascade_failures.is_empty()
    }

    pub fn record(&mut self, step: &str, err: impl fmt::Display) {
        tracing::warn!(step, error = %err, "cascade step failed");
        self.cascade_failures.push(format!("{step}: {err}"));
    }
}

// --- Helpers ---

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Reads an optional value where `null`, a missing key and `""` all mean `None`.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
