//! Deletes with dependent records.
//!
//! The primary delete runs first and decides the result: if it fails, nothing
//! else is attempted. Each cascade step then runs in turn. A failed step is
//! recorded in the returned `DeleteOutcome` and never undoes the primary
//! delete or stops the steps after it.

use uuid::Uuid;

use super::{RepoError, Repository};
use crate::models::DeleteOutcome;

/// Deletes a board, then its statuses and its cards.
pub async fn delete_board(repo: &dyn Repository, id: Uuid) -> Result<DeleteOutcome, RepoError> {
    repo.delete_board(id).await?;

    let mut outcome = DeleteOutcome::default();
    if let Err(e) = repo.delete_statuses_of_board(id).await {
        outcome.record("delete statuses", e);
    }
    if let Err(e) = repo.delete_cards_of_board(id).await {
        outcome.record("delete cards", e);
    }
    Ok(outcome)
}

/// Deletes a status. Its cards survive with the status cleared.
pub async fn delete_status(repo: &dyn Repository, id: Uuid) -> Result<DeleteOutcome, RepoError> {
    repo.delete_status(id).await?;

    let mut outcome = DeleteOutcome::default();
    if let Err(e) = repo.clear_card_status(id).await {
        outcome.record("clear card status", e);
    }
    Ok(outcome)
}

/// Deletes a page and its direct children. Grandchildren keep their now
/// dangling `parent_id`.
pub async fn delete_page(repo: &dyn Repository, id: Uuid) -> Result<DeleteOutcome, RepoError> {
    repo.delete_page(id).await?;

    let mut outcome = DeleteOutcome::default();
    if let Err(e) = repo.delete_child_pages(id).await {
        outcome.record("delete child pages", e);
    }
    Ok(outcome)
}
