#![allow(dead_code)]

use std::{
    collections::HashSet,
    future::Future,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use bell_backend::{
    AppConfig, AppState, MemoryRepository, RepositoryState, TokenService, UploadManager,
    UploadState, create_router,
    auth::hash_password,
    models::{Board, Card, CardFilter, Role, Status, UpdatePageRequest, User, WikiPage},
    repository::{RepoError, Repository, bounded},
};
use async_trait::async_trait;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// A router over a store and a private upload directory.
pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryState,
    pub uploads: UploadState,
    pub tokens: TokenService,
    pub upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

/// A fresh directory under the system temp dir, unique per call.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("bell-test-{}", Uuid::new_v4()))
}

pub async fn test_app() -> TestApp {
    test_app_with_grace(Duration::ZERO).await
}

pub async fn test_app_with_grace(grace: Duration) -> TestApp {
    build_app(Arc::new(MemoryRepository::new()), grace).await
}

/// A router over a caller-supplied store, such as a `FaultyRepository`.
pub async fn test_app_with_repo(repo: RepositoryState) -> TestApp {
    build_app(repo, Duration::ZERO).await
}

async fn build_app(repo: RepositoryState, grace: Duration) -> TestApp {
    let upload_dir = scratch_dir();
    let uploads: UploadState = Arc::new(
        UploadManager::new(upload_dir.clone(), grace)
            .await
            .expect("upload dir"),
    );
    let tokens = TokenService::new(TEST_SECRET);

    let state = AppState {
        repo: repo.clone(),
        uploads: uploads.clone(),
        tokens: tokens.clone(),
        config: AppConfig {
            jwt_secret: TEST_SECRET.to_string(),
            upload_dir: upload_dir.clone(),
            upload_grace: grace,
            ..AppConfig::default()
        },
    };

    TestApp {
        router: create_router(state),
        repo,
        uploads,
        tokens,
        upload_dir,
    }
}

impl TestApp {
    /// Sends one JSON request through the router and decodes the JSON reply.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, None, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None, None).await
    }

    /// Inserts an account directly into the store, bypassing registration.
    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        let user = User {
            role,
            ..User::new(
                "Seeded".to_string(),
                email.to_string(),
                hash_password(TEST_PASSWORD).unwrap(),
            )
        };
        self.repo.create_user(user).await.unwrap()
    }

    /// Logs in through the API and returns the session token.
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/login",
                serde_json::json!({ "email": email, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a board through the API and returns its id.
    pub async fn create_board(&self, name: &str) -> String {
        let (status, body) = self
            .post("/api/boards", serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["_id"].as_str().unwrap().to_string()
    }
}

/// Builds a multipart body with a single file field.
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "----bell-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// FaultyRepository
///
/// A `MemoryRepository` with switches for the ways a real store goes wrong.
/// Every call runs under `bounded` with a short deadline, like the Postgres
/// store does.
///
/// - `fail_primary`: every call fails with `RepoError::Store`.
/// - `fail_cascade`: only the dependent-record deletes of a cascade fail.
/// - `set_delay`: every call sleeps first, so a delay past the deadline
///   surfaces as `RepoError::Timeout`.
pub struct FaultyRepository {
    inner: MemoryRepository,
    limit: Duration,
    fail_primary: AtomicBool,
    fail_cascade: AtomicBool,
    delay_ms: AtomicU64,
    get_user_calls: AtomicUsize,
}

impl FaultyRepository {
    pub fn new(limit: Duration) -> Self {
        Self {
            inner: MemoryRepository::new(),
            limit,
            fail_primary: AtomicBool::new(false),
            fail_cascade: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            get_user_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_primary(&self, on: bool) {
        self.fail_primary.store(on, Ordering::SeqCst);
    }

    pub fn fail_cascade(&self, on: bool) {
        self.fail_cascade.store(on, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    async fn run<T>(
        &self,
        op: impl Future<Output = Result<T, RepoError>> + Send,
    ) -> Result<T, RepoError> {
        bounded(self.limit, async {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_primary.load(Ordering::SeqCst) {
                return Err(RepoError::Store("injected store failure".to_string()));
            }
            op.await
        })
        .await
    }

    async fn run_cascade(
        &self,
        op: impl Future<Output = Result<u64, RepoError>> + Send,
    ) -> Result<u64, RepoError> {
        if self.fail_cascade.load(Ordering::SeqCst) {
            return Err(RepoError::Store("injected cascade failure".to_string()));
        }
        self.run(op).await
    }
}

#[async_trait]
impl Repository for FaultyRepository {
    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        self.run(self.inner.create_user(user)).await
    }
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.run(self.inner.get_user(id)).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.run(self.inner.find_user_by_email(email)).await
    }
    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        self.run(self.inner.list_users()).await
    }
    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<User, RepoError> {
        self.run(self.inner.update_user_name(id, name)).await
    }
    async fn approve_user(&self, id: Uuid) -> Result<User, RepoError> {
        self.run(self.inner.approve_user(id)).await
    }
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.run(self.inner.delete_user(id)).await
    }

    async fn list_boards(&self) -> Result<Vec<Board>, RepoError> {
        self.run(self.inner.list_boards()).await
    }
    async fn board_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        self.run(self.inner.board_exists(id)).await
    }
    async fn create_board(&self, board: Board) -> Result<Board, RepoError> {
        self.run(self.inner.create_board(board)).await
    }
    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError> {
        self.run(self.inner.delete_board(id)).await
    }
    async fn delete_statuses_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        self.run_cascade(self.inner.delete_statuses_of_board(board_id))
            .await
    }
    async fn delete_cards_of_board(&self, board_id: Uuid) -> Result<u64, RepoError> {
        self.run_cascade(self.inner.delete_cards_of_board(board_id))
            .await
    }

    async fn list_statuses(&self, board_id: Option<Uuid>) -> Result<Vec<Status>, RepoError> {
        self.run(self.inner.list_statuses(board_id)).await
    }
    async fn status_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        self.run(self.inner.status_exists(id)).await
    }
    async fn create_status(&self, status: Status) -> Result<Status, RepoError> {
        self.run(self.inner.create_status(status)).await
    }
    async fn delete_status(&self, id: Uuid) -> Result<(), RepoError> {
        self.run(self.inner.delete_status(id)).await
    }
    async fn clear_card_status(&self, status_id: Uuid) -> Result<u64, RepoError> {
        self.run_cascade(self.inner.clear_card_status(status_id)).await
    }

    async fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>, RepoError> {
        self.run(self.inner.list_cards(filter)).await
    }
    async fn get_card(&self, id: Uuid) -> Result<Option<Card>, RepoError> {
        self.run(self.inner.get_card(id)).await
    }
    async fn create_card(&self, card: Card) -> Result<Card, RepoError> {
        self.run(self.inner.create_card(card)).await
    }
    async fn replace_card(&self, card: Card) -> Result<Card, RepoError> {
        self.run(self.inner.replace_card(card)).await
    }
    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError> {
        self.run(self.inner.delete_card(id)).await
    }
    async fn card_images(&self) -> Result<HashSet<String>, RepoError> {
        self.run(self.inner.card_images()).await
    }
    async fn count_cards_with_image(&self, path: &str) -> Result<u64, RepoError> {
        self.run(self.inner.count_cards_with_image(path)).await
    }

    async fn list_pages(&self) -> Result<Vec<WikiPage>, RepoError> {
        self.run(self.inner.list_pages()).await
    }
    async fn get_page(&self, id: Uuid) -> Result<Option<WikiPage>, RepoError> {
        self.run(self.inner.get_page(id)).await
    }
    async fn create_page(&self, page: WikiPage) -> Result<WikiPage, RepoError> {
        self.run(self.inner.create_page(page)).await
    }
    async fn update_page(&self, id: Uuid, patch: UpdatePageRequest) -> Result<WikiPage, RepoError> {
        self.run(self.inner.update_page(id, patch)).await
    }
    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        self.run(self.inner.delete_page(id)).await
    }
    async fn delete_child_pages(&self, parent_id: Uuid) -> Result<u64, RepoError> {
        self.run_cascade(self.inner.delete_child_pages(parent_id)).await
    }
}
