use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::parse_id;
use crate::{
    AppState,
    error::{ApiError, ValidJson},
    models::{CreatePageRequest, DeleteResponse, UpdatePageRequest, WikiPage},
    repository::{RepoError, cascade},
};

/// list_pages
///
/// [Public Route] Every wiki page as a flat list. Clients rebuild the tree
/// from `parentId`.
#[utoipa::path(
    get,
    path = "/api/wiki/pages",
    responses((status = 200, description = "Pages", body = [WikiPage]))
)]
pub async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<WikiPage>>, ApiError> {
    Ok(Json(state.repo.list_pages().await?))
}

/// get_page
///
/// [Public Route] A single page.
#[utoipa::path(
    get,
    path = "/api/wiki/pages/{id}",
    params(("id" = String, Path, description = "Page ID (UUID)")),
    responses(
        (status = 200, description = "Page", body = WikiPage),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WikiPage>, ApiError> {
    let id = parse_id(&id)?;
    state
        .repo
        .get_page(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("page not found"))
}

/// create_page
///
/// [Public Route] Creates a page, at the root or under `parentId`.
#[utoipa::path(
    post,
    path = "/api/wiki/pages",
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Created", body = WikiPage),
        (status = 400, description = "Missing title or unknown parent", body = crate::error::ErrorBody)
    )
)]
pub async fn create_page(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreatePageRequest>,
) -> Result<(StatusCode, Json<WikiPage>), ApiError> {
    payload.validate()?;
    if let Some(parent_id) = payload.parent_id {
        if state.repo.get_page(parent_id).await?.is_none() {
            return Err(ApiError::validation("parentId does not reference an existing page"));
        }
    }
    let page = state.repo.create_page(WikiPage::new(payload)).await?;
    tracing::info!(page_id = %page.id, "wiki page created");
    Ok((StatusCode::CREATED, Json(page)))
}

/// update_page
///
/// [Public Route] Updates `title`, `content` and `emoji`. Other fields in the
/// body, including `parentId`, are ignored.
#[utoipa::path(
    put,
    path = "/api/wiki/pages/{id}",
    params(("id" = String, Path, description = "Page ID (UUID)")),
    request_body = UpdatePageRequest,
    responses(
        (status = 200, description = "Updated", body = WikiPage),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<UpdatePageRequest>,
) -> Result<Json<WikiPage>, ApiError> {
    let id = parse_id(&id)?;
    patch.validate()?;
    match state.repo.update_page(id, patch).await {
        Ok(page) => Ok(Json(page)),
        Err(RepoError::NotFound) => Err(ApiError::not_found("page not found")),
        Err(e) => Err(e.into()),
    }
}

/// delete_page
///
/// [Public Route] Deletes a page and its direct children. Deeper descendants
/// are left in place with their `parentId` unchanged.
#[utoipa::path(
    delete,
    path = "/api/wiki/pages/{id}",
    params(("id" = String, Path, description = "Page ID (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = cascade::delete_page(state.repo.as_ref(), id).await?;
    tracing::info!(page_id = %id, complete = outcome.is_complete(), "wiki page deleted");
    Ok(Json(outcome.into()))
}
