use axum::{
    Json,
    extract::{Path, State},
};

use super::parse_id;
use crate::{
    AppState,
    error::{ApiError, ValidJson, ValidQuery},
    models::{
        Board, BoardFilter, Card, CardFilter, CardRequest, CreateBoardRequest,
        CreateStatusRequest, DeleteOutcome, DeleteResponse, Status,
    },
    repository::cascade,
};

// --- Boards ---

/// list_boards
///
/// [Public Route] Every board, oldest first.
#[utoipa::path(
    get,
    path = "/api/boards",
    responses((status = 200, description = "Boards", body = [Board]))
)]
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<Board>>, ApiError> {
    Ok(Json(state.repo.list_boards().await?))
}

/// create_board
///
/// [Public Route] Creates a board. The server assigns the id and both timestamps.
#[utoipa::path(
    post,
    path = "/api/boards",
    request_body = CreateBoardRequest,
    responses(
        (status = 200, description = "Created", body = Board),
        (status = 400, description = "Missing name", body = crate::error::ErrorBody)
    )
)]
pub async fn create_board(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateBoardRequest>,
) -> Result<Json<Board>, ApiError> {
    payload.validate()?;
    let board = state
        .repo
        .create_board(Board::new(payload.name.trim().to_string()))
        .await?;
    tracing::info!(board_id = %board.id, "board created");
    Ok(Json(board))
}

/// delete_board
///
/// [Public Route] Deletes a board together with its statuses and cards.
#[utoipa::path(
    delete,
    path = "/api/boards/{id}",
    params(("id" = String, Path, description = "Board ID (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_board(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = cascade::delete_board(state.repo.as_ref(), id).await?;
    tracing::info!(board_id = %id, complete = outcome.is_complete(), "board deleted");
    Ok(Json(outcome.into()))
}

// --- Statuses ---

/// list_statuses
///
/// [Public Route] Statuses, optionally restricted to one board via `?boardId=`.
#[utoipa::path(
    get,
    path = "/api/statuses",
    params(BoardFilter),
    responses((status = 200, description = "Statuses", body = [Status]))
)]
pub async fn list_statuses(
    State(state): State<AppState>,
    ValidQuery(filter): ValidQuery<BoardFilter>,
) -> Result<Json<Vec<Status>>, ApiError> {
    Ok(Json(state.repo.list_statuses(filter.board_id).await?))
}

/// create_status
///
/// [Public Route] Creates a status on an existing board.
#[utoipa::path(
    post,
    path = "/api/statuses",
    request_body = CreateStatusRequest,
    responses(
        (status = 200, description = "Created", body = Status),
        (status = 400, description = "Invalid body or unknown board", body = crate::error::ErrorBody)
    )
)]
pub async fn create_status(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateStatusRequest>,
) -> Result<Json<Status>, ApiError> {
    payload.validate()?;
    if !state.repo.board_exists(payload.board_id).await? {
        return Err(ApiError::validation("boardId does not reference an existing board"));
    }
    let status = Status::new(payload.board_id, payload.name.trim().to_string());
    Ok(Json(state.repo.create_status(status).await?))
}

/// delete_status
///
/// [Public Route] Deletes a status. Cards in it survive with their status cleared.
#[utoipa::path(
    delete,
    path = "/api/statuses/{id}",
    params(("id" = String, Path, description = "Status ID (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = cascade::delete_status(state.repo.as_ref(), id).await?;
    Ok(Json(outcome.into()))
}

// --- Cards ---

/// list_cards
///
/// [Public Route] Cards filtered by `?boardId=` and/or `?tag=`.
#[utoipa::path(
    get,
    path = "/api/cards",
    params(CardFilter),
    responses((status = 200, description = "Cards", body = [Card]))
)]
pub async fn list_cards(
    State(state): State<AppState>,
    ValidQuery(mut filter): ValidQuery<CardFilter>,
) -> Result<Json<Vec<Card>>, ApiError> {
    // Tags are stored without the leading '#'.
    filter.tag = filter
        .tag
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty());
    Ok(Json(state.repo.list_cards(&filter).await?))
}

/// create_card
///
/// [Public Route] Creates a card on an existing board.
#[utoipa::path(
    post,
    path = "/api/cards",
    request_body = CardRequest,
    responses(
        (status = 200, description = "Created", body = Card),
        (status = 400, description = "Invalid body or dangling reference", body = crate::error::ErrorBody)
    )
)]
pub async fn create_card(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CardRequest>,
) -> Result<Json<Card>, ApiError> {
    check_card(&state, &payload).await?;
    Ok(Json(state.repo.create_card(Card::new(payload)).await?))
}

/// update_card
///
/// [Public Route] Replaces every mutable field of a card. The id and creation
/// time are preserved and `updatedAt` is recomputed.
#[utoipa::path(
    put,
    path = "/api/cards/{id}",
    params(("id" = String, Path, description = "Card ID (UUID)")),
    request_body = CardRequest,
    responses(
        (status = 200, description = "Updated", body = Card),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<CardRequest>,
) -> Result<Json<Card>, ApiError> {
    let id = parse_id(&id)?;
    let current = state
        .repo
        .get_card(id)
        .await?
        .ok_or_else(|| ApiError::not_found("card not found"))?;
    check_card(&state, &payload).await?;
    Ok(Json(state.repo.replace_card(current.replace(payload)).await?))
}

/// delete_card
///
/// [Public Route] Deletes a single card.
#[utoipa::path(
    delete,
    path = "/api/cards/{id}",
    params(("id" = String, Path, description = "Card ID (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.repo.delete_card(id).await?;
    Ok(Json(DeleteOutcome::default().into()))
}

/// Body validation plus referential checks: the board must exist, a status
/// must exist when given, and an image must be a stored upload.
async fn check_card(state: &AppState, payload: &CardRequest) -> Result<(), ApiError> {
    payload.validate()?;
    if !state.repo.board_exists(payload.board_id).await? {
        return Err(ApiError::validation("boardId does not reference an existing board"));
    }
    if let Some(status_id) = payload.status_id {
        if !state.repo.status_exists(status_id).await? {
            return Err(ApiError::validation("statusId does not reference an existing status"));
        }
    }
    if let Some(image) = &payload.image {
        if !state.uploads.exists(image).await {
            return Err(ApiError::validation("image does not reference a stored upload"));
        }
    }
    Ok(())
}
