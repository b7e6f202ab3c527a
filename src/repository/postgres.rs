use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{RepoError, Repository, bounded};
use crate::models::{
    Board, Card, CardFilter, Role, Status, UpdatePageRequest, User, WikiPage,
};

const SCHEMA: [&str; 8] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        approved BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS boards (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS statuses (
        id UUID PRIMARY KEY,
        board_id UUID NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cards (
        id UUID PRIMARY KEY,
        board_id UUID NOT NULL,
        status_id UUID,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL DEFAULT '',
        image TEXT,
        tags TEXT[] NOT NULL DEFAULT '{}',
        due_date TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS wiki_pages (
        id UUID PRIMARY KEY,
        parent_id UUID,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        emoji TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_idx ON users (lower(email))",
    "CREATE INDEX IF NOT EXISTS cards_board_id_idx ON cards (board_id)",
    "CREATE INDEX IF NOT EXISTS wiki_pages_parent_id_idx ON wiki_pages (parent_id)",
];

const CARD_COLUMNS: &str = "id, board_id, status_id, title, description, color, image, tags, due_date, created_at, updated_at";
const PAGE_COLUMNS: &str = "id, parent_id, title, content, emoji, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, approved, created_at";

/// Row shape of `users`; `role` is stored as text.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    approved: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = row.role.parse().unwrap_or_else(|e: String| {
            tracing::warn!(user_id = %row.id, error = %e, "unknown stored role, treating as user");
            Role::User
        });
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            approved: row.approved,
            created_at: row.created_at,
        }
    }
}

fn store_err(op: &'static str) -> impl Fn(sqlx::Error) -> RepoError {
    move |e| {
        tracing::error!(op, error = ?e, "store operation failed");
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::PoolTimedOut => RepoError::Timeout,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict("email already registered".to_string())
            }
            other => RepoError::Store(other.to_string()),
        }
    }
}

fn affected(rows: u64) -> Result<(), RepoError> {
    if rows == 0 { Err(RepoError::NotFound) } else { Ok(()) }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Every operation runs under the configured store timeout.
pub struct PostgresRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// ensure_schema
    ///
    /// Creates the collections if they do not exist yet. Idempotent, so it is
    /// safe to call at every startup.
    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_err("ensure_schema"))?;
        }
        Ok(())
    }

    /// Runs a `DELETE ... WHERE <column> = $1` and returns the rows removed.
    async fn delete_by(
        &self,
        op: &'static str,
        sql: &'static str,
        id: Uuid,
    ) -> Result<u64, RepoError> {
        bounded(self.timeout, async {
            let result = sqlx::query(sql)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(store_err(op))?;
            Ok(result.rows_affected())
        })
        .await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        bounded(self.timeout, async {
            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, role, approved, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.approved)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(store_err("create_user"))?;
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("get_user"))?;
            Ok(row.map(User::from))
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("find_user_by_email"))?;
            Ok(row.map(User::from))
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("list_users"))?;
            Ok(rows.into_iter().map(User::from).collect())
        })
        .await
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User, RepoError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users SET name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("update_user_name"))?;
            row.map(User::from).ok_or(RepoError::NotFound)
        })
        .await
    }

    async fn approve_user(&self, id: Uuid) -> Result<User, RepoError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users SET approved = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("approve_user"))?;
            row.map(User::from).ok_or(RepoError::NotFound)
        })
        .await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.delete_by("delete_user", "DELETE FROM users WHERE id = $1", id)
            .await
            .and_then(affected)
    }

    async fn list_boards(&self) -> Result<Vec<Board>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Board>(
                "SELECT id, name, created_at, updated_at FROM boards ORDER BY created_at",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("list_boards"))
        })
        .await
    }

    async fn board_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM boards WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err("board_exists"))
        })
        .await
    }

    async fn create_board(&self, board: Board) -> Result<Board, RepoError> {
        bounded(self.timeout, async {
            sqlx::query("INSERT INTO boards (id, name, created_at, updated_at) VALUES ($1, $2, $3, $4)")
                .bind(board.id)
                .bind(&board.name)
                .bind(board.created_at)
                .bind(board.updated_at)
                .execute(&self.pool)
                .await
                .map_err(store_err("create_board"))?;
            Ok(board)
        })
        .await
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError> {
        self.delete_by("delete_board", "DELETE FROM boards WHERE id = $1", id)
            .await
            .and_then(affected)
    }

    async fn delete_statuses_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        self.delete_by(
            "delete_statuses_of_board",
            "DELETE FROM statuses WHERE board_id = $1",
            board_id,
        )
        .await
    }

    async fn delete_cards_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        self.delete_by(
            "delete_cards_of_board",
            "DELETE FROM cards WHERE board_id = $1",
            board_id,
        )
        .await
    }

    async fn list_statuses(&self, board_id: Option<Uuid>) -> Result<Vec<Status>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Status>(
                "SELECT id, board_id, name, created_at, updated_at FROM statuses \
                 WHERE ($1::uuid IS NULL OR board_id = $1) ORDER BY created_at",
            )
            .bind(board_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("list_statuses"))
        })
        .await
    }

    async fn status_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM statuses WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err("status_exists"))
        })
        .await
    }

    async fn create_status(&self, status: Status) -> Result<Status, RepoError> {
        bounded(self.timeout, async {
            sqlx::query(
                "INSERT INTO statuses (id, board_id, name, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(status.id)
            .bind(status.board_id)
            .bind(&status.name)
            .bind(status.created_at)
            .bind(status.updated_at)
            .execute(&self.pool)
            .await
            .map_err(store_err("create_status"))?;
            Ok(status)
        })
        .await
    }

    async fn delete_status(&self, id: Uuid) -> Result<(), RepoError> {
        self.delete_by("delete_status", "DELETE FROM statuses WHERE id = $1", id)
            .await
            .and_then(affected)
    }

    async fn clear_card_status(&self, status_id: Uuid) -> Result<u64, RepoError> {
        bounded(self.timeout, async {
            let result = sqlx::query(
                "UPDATE cards SET status_id = NULL, updated_at = $2 WHERE status_id = $1",
            )
            .bind(status_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(store_err("clear_card_status"))?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Card>(&format!(
                "SELECT {CARD_COLUMNS} FROM cards \
                 WHERE ($1::uuid IS NULL OR board_id = $1) \
                   AND ($2::text IS NULL OR $2 = ANY(tags)) \
                 ORDER BY created_at"
            ))
            .bind(filter.board_id)
            .bind(filter.tag.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("list_cards"))
        })
        .await
    }

    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Card>(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err("get_card"))
        })
        .await
    }

    async fn create_card(&self, card: Card) -> Result<Card, RepoError> {
        bounded(self.timeout, async {
            sqlx::query(&format!(
                "INSERT INTO cards ({CARD_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ))
            .bind(card.id)
            .bind(card.board_id)
            .bind(card.status_id)
            .bind(&card.title)
            .bind(&card.description)
            .bind(&card.color)
            .bind(&card.image)
            .bind(&card.tags)
            .bind(&card.due_date)
            .bind(card.created_at)
            .bind(card.updated_at)
            .execute(&self.pool)
            .await
            .map_err(store_err("create_card"))?;
            Ok(card)
        })
        .await
    }

    async fn replace_card(&self, card: Card) -> Result<Card, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Card>(&format!(
                "UPDATE cards SET board_id = $2, status_id = $3, title = $4, description = $5, \
                 color = $6, image = $7, tags = $8, due_date = $9, updated_at = $10 \
                 WHERE id = $1 RETURNING {CARD_COLUMNS}"
            ))
            .bind(card.id)
            .bind(card.board_id)
            .bind(card.status_id)
            .bind(&card.title)
            .bind(&card.description)
            .bind(&card.color)
            .bind(&card.image)
            .bind(&card.tags)
            .bind(&card.due_date)
            .bind(card.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("replace_card"))?
            .ok_or(RepoError::NotFound)
        })
        .await
    }

    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError> {
        self.delete_by("delete_card", "DELETE FROM cards WHERE id = $1", id)
            .await
            .and_then(affected)
    }

    async fn card_images(&self) -> Result<HashSet<String>, RepoError> {
        bounded(self.timeout, async {
            let images = sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT image FROM cards WHERE image IS NOT NULL AND image <> ''",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("card_images"))?;
            Ok(images.into_iter().collect())
        })
        .await
    }

    async fn count_cards_with_image(&self, path: &str) -> Result<u64, RepoError> {
        bounded(self.timeout, async {
            let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cards WHERE image = $1")
                .bind(path)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err("count_cards_with_image"))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn list_pages(&self) -> Result<Vec<WikiPage>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, WikiPage>(&format!(
                "SELECT {PAGE_COLUMNS} FROM wiki_pages ORDER BY created_at"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("list_pages"))
        })
        .await
    }

    async fn get_page(&self, id: Uuid) -> Result<Option<WikiPage>, RepoError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, WikiPage>(&format!(
                "SELECT {PAGE_COLUMNS} FROM wiki_pages WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("get_page"))
        })
        .await
    }

    async fn create_page(&self, page: WikiPage) -> Result<WikiPage, RepoError> {
        bounded(self.timeout, async {
            sqlx::query(&format!(
                "INSERT INTO wiki_pages ({PAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(page.id)
            .bind(page.parent_id)
            .bind(&page.title)
            .bind(&page.content)
            .bind(&page.emoji)
            .bind(page.created_at)
            .bind(page.updated_at)
            .execute(&self.pool)
            .await
            .map_err(store_err("create_page"))?;
            Ok(page)
        })
        .await
    }

    async fn update_page(&self, id: Uuid, patch: UpdatePageRequest) -> Result<WikiPage, RepoError> {
        // COALESCE keeps fields the patch leaves out.
        bounded(self.timeout, async {
            sqlx::query_as::<_, WikiPage>(&format!(
                "UPDATE wiki_pages SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), emoji = COALESCE($4, emoji), updated_at = $5 \
                 WHERE id = $1 RETURNING {PAGE_COLUMNS}"
            ))
            .bind(id)
            .bind(patch.title.as_deref().map(str::trim))
            .bind(patch.content.as_deref())
            .bind(patch.emoji.as_deref())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("update_page"))?
            .ok_or(RepoError::NotFound)
        })
        .await
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        self.delete_by("delete_page", "DELETE FROM wiki_pages WHERE id = $1", id)
            .await
            .and_then(affected)
    }

    async fn delete_child_pages(&self, parent_id: Uuid) -> Result<u64, RepoError> {
        self.delete_by(
            "delete_child_pages",
            "DELETE FROM wiki_pages WHERE parent_id = $1",
            parent_id,
        )
        .await
    }
}
