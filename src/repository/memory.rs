use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoError, Repository};
use crate::models::{Board, Card, CardFilter, Status, UpdatePageRequest, User, WikiPage};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    boards: Vec<Board>,
    statuses: Vec<Status>,
    cards: Vec<Card>,
    pages: Vec<WikiPage>,
}

/// MemoryRepository
///
/// In-process document store. Each collection keeps insertion order so listings
/// are stable. Every operation takes the lock once, which gives the same
/// per-operation atomicity as the real store and nothing more.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Collections>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        let mut db = self.inner.write().await;
        if db.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepoError::Conflict("email already registered".to_string()));
        }
        db.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let db = self.inner.read().await;
        Ok(db.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let db = self.inner.read().await;
        Ok(db
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User, RepoError> {
        let mut db = self.inner.write().await;
        let user = db
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.name = name.to_string();
        Ok(user.clone())
    }

    async fn approve_user(&self, id: Uuid) -> Result<User, RepoError> {
        let mut db = self.inner.write().await;
        let user = db
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.approved = true;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let mut db = self.inner.write().await;
        let before = db.users.len();
        db.users.retain(|u| u.id != id);
        if db.users.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_boards(&self) -> Result<Vec<Board>, RepoError> {
        Ok(self.inner.read().await.boards.clone())
    }

    async fn board_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.inner.read().await.boards.iter().any(|b| b.id == id))
    }

    async fn create_board(&self, board: Board) -> Result<Board, RepoError> {
        self.inner.write().await.boards.push(board.clone());
        Ok(board)
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError> {
        let mut db = self.inner.write().await;
        let before = db.boards.len();
        db.boards.retain(|b| b.id != id);
        if db.boards.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_statuses_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        let mut db = self.inner.write().await;
        let before = db.statuses.len();
        db.statuses.retain(|s| s.board_id != board_id);
        Ok((before - db.statuses.len()) as u64)
    }

    async fn delete_cards_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        let mut db = self.inner.write().await;
        let before = db.cards.len();
        db.cards.retain(|c| c.board_id != board_id);
        Ok((before - db.cards.len()) as u64)
    }

    async fn list_statuses(&self, board_id: Option<Uuid>) -> Result<Vec<Status>, RepoError> {
        let db = self.inner.read().await;
        Ok(db
            .statuses
            .iter()
            .filter(|s| board_id.is_none_or(|b| s.board_id == b))
            .cloned()
            .collect())
    }

    async fn status_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.inner.read().await.statuses.iter().any(|s| s.id == id))
    }

    async fn create_status(&self, status: Status) -> Result<Status, RepoError> {
        self.inner.write().await.statuses.push(status.clone());
        Ok(status)
    }

    async fn delete_status(&self, id: Uuid) -> Result<(), RepoError> {
        let mut db = self.inner.write().await;
        let before = db.statuses.len();
        db.statuses.retain(|s| s.id != id);
        if db.statuses.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn clear_card_status(&self, status_id: Uuid) -> Result<u64, RepoError> {
        let mut db = self.inner.write().await;
        let now = Utc::now();
        let mut cleared = 0;
        for card in db.cards.iter_mut().filter(|c| c.status_id == Some(status_id)) {
            card.status_id = None;
            card.updated_at = now;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>, RepoError> {
        let db = self.inner.read().await;
        Ok(db
            .cards
            .iter()
            .filter(|c| filter.board_id.is_none_or(|b| c.board_id == b))
            .filter(|c| filter.tag.as_ref().is_none_or(|t| c.tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, RepoError> {
        Ok(self.inner.read().await.cards.iter().find(|c| c.id == id).cloned())
    }

    async fn create_card(&self, card: Card) -> Result<Card, RepoError> {
        self.inner.write().await.cards.push(card.clone());
        Ok(card)
    }

    async fn replace_card(&self, card: Card) -> Result<Card, RepoError> {
        let mut db = self.inner.write().await;
        let slot = db
            .cards
            .iter_mut()
            .find(|c| c.id == card.id)
            .ok_or(RepoError::NotFound)?;
        *slot = card.clone();
        Ok(card)
    }

    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError> {
        let mut db = self.inner.write().await;
        let before = db.cards.len();
        db.cards.retain(|c| c.id != id);
        if db.cards.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn card_images(&self) -> Result<HashSet<String>, RepoError> {
        let db = self.inner.read().await;
        Ok(db.cards.iter().filter_map(|c| c.image.clone()).collect())
    }

    async fn count_cards_with_image(&self, path: &str) -> Result<u64, RepoError> {
        let db = self.inner.read().await;
        Ok(db
            .cards
            .iter()
            .filter(|c| c.image.as_deref() == Some(path))
            .count() as u64)
    }

    async fn list_pages(&self) -> Result<Vec<WikiPage>, RepoError> {
        Ok(self.inner.read().await.pages.clone())
    }

    async fn get_page(&self, id: Uuid) -> Result<Option<WikiPage>, RepoError> {
        Ok(self.inner.read().await.pages.iter().find(|p| p.id == id).cloned())
    }

    async fn create_page(&self, page: WikiPage) -> Result<WikiPage, RepoError> {
        self.inner.write().await.pages.push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, id: Uuid, patch: UpdatePageRequest) -> Result<WikiPage, RepoError> {
        let mut db = self.inner.write().await;
        let page = db
            .pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        page.apply(patch);
        Ok(page.clone())
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut db = self.inner.write().await;
        let before = db.pages.len();
        db.pages.retain(|p| p.id != id);
        if db.pages.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_child_pages(&self, parent_id: Uuid) -> Result<u64, RepoError> {
        let mut db = self.inner.write().await;
        let before = db.pages.len();
        db.pages.retain(|p| p.parent_id != Some(parent_id));
        Ok((before - db.pages.len()) as u64)
    }
}
