use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Board, Card, CardFilter, Status, UpdatePageRequest, User, WikiPage};

pub mod cascade;
mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failure modes of a single store operation.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("store error: {0}")]
    Store(String),
}

/// Repository Trait
///
/// The document-store seam. Handlers only ever see this trait, so the Postgres
/// implementation and the in-process store are interchangeable.
///
/// Every method is a single-record or single-collection operation and is
/// atomic on its own. Deletes with dependents are composed from these
/// primitives in `cascade`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    // Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: User) -> Result<User, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User, RepoError>;
    async fn approve_user(&self, id: Uuid) -> Result<User, RepoError>;
    // Hard delete, no audit trail.
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;

    // --- Boards ---
    async fn list_boards(&self) -> Result<Vec<Board>, RepoError>;
    async fn board_exists(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn create_board(&self, board: Board) -> Result<Board, RepoError>;
    // Removes the board record only.
    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError>;
    async fn delete_statuses_of_board(&self, board_id: Uuid) -> Result<u64, RepoError>;
    async fn delete_cards_of_board(&self, board_id: Uuid) -> Result<u64, RepoError>;

    // --- Statuses ---
    async fn list_statuses(&self, board_id: Option<Uuid>) -> Result<Vec<Status>, RepoError>;
    async fn status_exists(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn create_status(&self, status: Status) -> Result<Status, RepoError>;
    async fn delete_status(&self, id: Uuid) -> Result<(), RepoError>;
    // Sets `status_id` to none on every card in the status and bumps `updated_at`.
    async fn clear_card_status(&self, status_id: Uuid) -> Result<u64, RepoError>;

    // --- Cards ---
    async fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>, RepoError>;
    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, RepoError>;
    async fn create_card(&self, card: Card) -> Result<Card, RepoError>;
    // Replaces every mutable field of the stored card with the same id.
    async fn replace_card(&self, card: Card) -> Result<Card, RepoError>;
    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError>;
    // Distinct non-empty image paths currently referenced by cards.
    async fn card_images(&self) -> Result<HashSet<String>, RepoError>;
    async fn count_cards_with_image(&self, path: &str) -> Result<u64, RepoError>;

    // --- Wiki ---
    async fn list_pages(&self) -> Result<Vec<WikiPage>, RepoError>;
    async fn get_page(&self, id: Uuid) -> Result<Option<WikiPage>, RepoError>;
    async fn create_page(&self, page: WikiPage) -> Result<WikiPage, RepoError>;
    async fn update_page(&self, id: Uuid, patch: UpdatePageRequest) -> Result<WikiPage, RepoError>;
    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError>;
    // Pages whose `parent_id` is exactly `parent_id`. Deeper levels are untouched.
    async fn delete_child_pages(&self, parent_id: Uuid) -> Result<u64, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// bounded
///
/// Runs one store operation under a deadline. A slow store yields
/// `RepoError::Timeout` instead of pinning the request handler.
pub async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(timeout_ms = limit.as_millis() as u64, "store operation timed out");
            Err(RepoError::Timeout)
        }
    }
}
