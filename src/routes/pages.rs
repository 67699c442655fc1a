use crate::AppState;
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Pages Router Module
///
/// Serves the built portal frontend bundle for every browser-facing path
/// (everything outside /api). The route gate middleware is layered on top of
/// this router by `create_router`, so each page navigation is access-checked
/// against the session before a single byte of the bundle is served.
///
/// The bundle is a single-page app: unknown paths fall back to index.html and
/// the client router takes over from there. The gate has already made its
/// decision by then, so the fallback can stay dumb.
pub fn page_routes(static_dir: &str) -> Router<AppState> {
    let index = format!("{}/index.html", static_dir.trim_end_matches('/'));

    Router::new().fallback_service(
        ServeDir::new(static_dir).not_found_service(ServeFile::new(index)),
    )
}
