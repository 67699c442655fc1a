use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;

// Module for routing segregation (Public, Authenticated, Admin, Pages).
pub mod routes;
use auth::AuthUser; // The resolved authenticated identity.
use routes::{admin, authenticated, pages, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point
// (main.rs) and the integration test suite.
pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::{SessionState, SessionStore};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// This struct auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application. It aggregates all API paths and data schemas that have been
/// decorated with the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::login, handlers::logout, handlers::register, handlers::get_me,
        handlers::get_penduduk_list, handlers::get_penduduk_detail, handlers::create_penduduk,
        handlers::update_penduduk, handlers::delete_penduduk, handlers::get_keluarga_saya,
        handlers::create_keluarga_saya, handlers::get_admin_keluarga, handlers::create_keluarga,
        handlers::get_aktivitas_list,
        handlers::create_aktivitas, handlers::update_aktivitas, handlers::delete_aktivitas,
        handlers::get_pengumuman_list, handlers::create_pengumuman, handlers::update_pengumuman,
        handlers::delete_pengumuman, handlers::get_admin_stats, handlers::get_presigned_url
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::Role, models::User, models::UserProfile, models::Penduduk,
            models::Keluarga, models::KeluargaResponse, models::Aktivitas, models::Pengumuman,
            models::LoginRequest, models::LoginResponse, models::RegisterRequest,
            models::CreatePendudukRequest, models::UpdatePendudukRequest,
            models::CreateKeluargaRequest, models::CreateAktivitasRequest,
            models::UpdateAktivitasRequest, models::CreatePengumumanRequest,
            models::UpdatePengumumanRequest, models::PresignedUrlRequest,
            models::PresignedUrlResponse, models::DashboardStats,
        )
    ),
    tags(
        (name = "sipakerte", description = "Sistem Informasi RT/RW API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and
/// immutable container holding all essential application services and
/// configuration. The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Abstracts database access.
    pub repo: RepositoryState,
    /// Storage Layer: Abstracts photo storage and presigned URL generation.
    pub storage: StorageState,
    /// Session Registry: the single session-context object consulted by both
    /// the route gate and the API auth extractor, mutated only through
    /// login/logout/expiry.
    pub sessions: SessionState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers to selectively pull components from the
// shared AppState. This is critical for dependency injection and keeping the
// extractor signatures honest about what they touch.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// A middleware function that enforces authentication for the
/// `authenticated_routes`.
///
/// *Mechanism*: It attempts to extract `AuthUser` from the request. Since
/// `AuthUser` implements `FromRequestParts`, if authentication (session lookup,
/// DB verification) fails, the extractor immediately rejects the request with a
/// 401 Unauthorized status, preventing execution of the handler. If successful,
/// it allows the request to proceed.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and
/// scoped middleware, and registers the application state.
///
/// Two distinct access-control surfaces coexist here:
/// - The **/api** surface answers failures with status codes (401/403); it is
///   never wrapped by the route gate.
/// - The **page** surface (everything else) is wrapped by the route gate, which
///   answers with navigation decisions (redirects / not-found rewrite).
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api_router = Router::new()
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        // This implements the first layer of Defense-in-Depth for these routes.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: Nested under '/api/admin'. The ADMIN role check is
        // performed *inside* the handlers after the authentication layer above.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    // 3. Page Router Assembly
    // The route gate makes its allow/redirect/rewrite decision before any page
    // byte is served; the static fallback below it stays access-unaware.
    let page_router = pages::page_routes(&state.config.static_dir)
        .layer(middleware::from_fn_with_state(state.clone(), gate::route_gate));

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_router)
        .merge(page_router)
        // Apply the Unified State to all routes.
        .with_state(state);

    // 4. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a unique UUID for every incoming
                // request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: Wraps the entire request/response lifecycle
                // in a tracing span. Uses the `trace_span_logger` to include the
                // generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: Ensures the generated x-request-id
                // header is returned to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer (Applied last, allowing all traffic in/out after
        // processing)
        .layer(cors)
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI.
///
/// *Goal*: Ensure every log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    // The structured log format used by the tracing macros.
    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
