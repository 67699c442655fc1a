use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to accounts with the ADMIN role.
/// These endpoints provide registry management, scheduling, publishing and
/// statistical oversight for the neighborhood administrators.
///
/// Access Control:
/// This entire router is nested under /api/admin and sits behind the
/// authentication layer; on top of that, every handler explicitly checks for
/// `role == Role::Admin` before touching the repository. The double check keeps
/// a routing mistake from ever exposing a moderation function.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Retrieves core dashboard counters (residents, household cards,
        // upcoming activities, announcements).
        .route("/stats", get(handlers::get_admin_stats))
        // GET/POST /api/admin/keluarga
        // Lists ALL household cards with member counts, and registers new cards.
        .route(
            "/keluarga",
            get(handlers::get_admin_keluarga).post(handlers::create_keluarga),
        )
        // DELETE /api/admin/penduduk/{id}
        // Removes a resident record from the registry entirely.
        .route("/penduduk/{id}", delete(handlers::delete_penduduk))
        // POST /api/admin/aktivitas, PUT/DELETE /api/admin/aktivitas/{id}
        // Activity schedule management: create, edit (typically advancing the
        // status), and removal.
        .route("/aktivitas", post(handlers::create_aktivitas))
        .route(
            "/aktivitas/{id}",
            put(handlers::update_aktivitas).delete(handlers::delete_aktivitas),
        )
        // POST /api/admin/pengumuman, PUT/DELETE /api/admin/pengumuman/{id}
        // Announcement publishing, editing and retraction.
        .route("/pengumuman", post(handlers::create_pengumuman))
        .route(
            "/pengumuman/{id}",
            put(handlers::update_pengumuman).delete(handlers::delete_pengumuman),
        )
}
