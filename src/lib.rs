use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue},
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Routers grouped by the access they require (Public, Authenticated, Admin).
pub mod routes;
use auth::{AdminOnly, AnyUser, require_role};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{UploadManager, UploadState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire type, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::kanban::list_boards, handlers::kanban::create_board,
        handlers::kanban::delete_board, handlers::kanban::list_statuses,
        handlers::kanban::create_status, handlers::kanban::delete_status,
        handlers::kanban::list_cards, handlers::kanban::create_card,
        handlers::kanban::update_card, handlers::kanban::delete_card,
        handlers::uploads::upload_file, handlers::uploads::cleanup_uploads,
        handlers::account::register, handlers::account::login,
        handlers::account::get_profile, handlers::account::update_profile,
        handlers::admin::list_users, handlers::admin::approve_user,
        handlers::admin::reject_user, handlers::admin::delete_user,
        handlers::wiki::list_pages, handlers::wiki::get_page,
        handlers::wiki::create_page, handlers::wiki::update_page,
        handlers::wiki::delete_page
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::Board, models::Status, models::Card,
            models::WikiPage, models::CreateBoardRequest, models::CreateStatusRequest,
            models::CardRequest, models::CreatePageRequest, models::UpdatePageRequest,
            models::RegisterRequest, models::LoginRequest, models::UpdateProfileRequest,
            models::UserIdRequest, models::AuthResponse, models::MessageResponse,
            models::DeleteResponse, models::UploadResponse, models::CleanupResponse,
            error::ErrorBody,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "bell", description = "Kanban, wiki and account API")
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single container of shared services. Cloned per request, so every
/// field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Document store behind the `Repository` trait.
    pub repo: RepositoryState,
    /// Upload directory manager.
    pub uploads: UploadState,
    /// Session token issuer and verifier.
    pub tokens: TokenService,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and middleware pull single components out of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for UploadState {
    fn from_ref(app_state: &AppState) -> UploadState {
        app_state.uploads.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, applies the role gates and the observability
/// layers, and mounts the upload directory and the API docs.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(allowed_origin(state.config.cors_origin.as_deref()))
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");
    let upload_dir = state.uploads.dir().to_path_buf();

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Any signed-in account.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_role::<AnyUser>,
            )),
        )
        // Administrators only.
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_role::<AdminOnly>,
            )),
        )
        // Stored uploads are public static files.
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// An exact origin when one is configured, otherwise any.
fn allowed_origin(configured: Option<&str>) -> AllowOrigin {
    match configured.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS origin is not a valid header value, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    }
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries the
/// same `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
