use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any account that has passed the
/// authentication layer. This module implements the shared portal features for
/// both roles: registry reads, the resident's own household view, profile and
/// photo management, and session termination.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above this module. This guarantees that all
/// handlers receive a validated `AuthUser` struct containing the account's ID
/// and role, which is then used for all ownership checks (e.g., in
/// `update_penduduk` and `create_penduduk`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        // Retrieves the currently authenticated account's profile and role.
        // The portal calls this after login to decide which navigation to render.
        .route("/auth/me", get(handlers::get_me))
        // POST /api/auth/logout
        // Revokes the session server-side and clears the token/role cookie pair
        // as a unit.
        .route("/auth/logout", post(handlers::logout))
        // --- Resident Registry ---
        // GET /api/penduduk?search=...
        // Lists the resident registry with free-text search over nama/NIK/alamat.
        // POST /api/penduduk
        // Adds a resident. Residents may only add members to their own household
        // card; the handler enforces this by resolving the caller's card.
        .route(
            "/penduduk",
            get(handlers::get_penduduk_list).post(handlers::create_penduduk),
        )
        // GET/PUT /api/penduduk/{id}
        // Detail view and record edit. Edits are owner-or-admin: a resident can
        // only modify the record linked to their own account.
        .route(
            "/penduduk/{id}",
            get(handlers::get_penduduk_detail).put(handlers::update_penduduk),
        )
        // --- Household Card ---
        // GET /api/keluarga/saya
        // The caller's own household card with its member list ("keluarga saya").
        .route("/keluarga/saya", get(handlers::get_keluarga_saya))
        // POST /api/keluarga
        // Registers the caller's own household card (onboarding step after
        // profile completion); the caller becomes kepala keluarga.
        .route("/keluarga", post(handlers::create_keluarga_saya))
        // --- Schedule & Announcements (read side) ---
        // GET /api/aktivitas?status=...
        // The activity schedule, optionally filtered by status.
        .route("/aktivitas", get(handlers::get_aktivitas_list))
        // GET /api/pengumuman?kategori=...
        // Announcements, newest first, optionally filtered by kategori.
        .route("/pengumuman", get(handlers::get_pengumuman_list))
        // --- Photo Upload ---
        // POST /api/upload/presigned
        // Initiates the profile photo upload pipeline. Generates a short-lived
        // (10-minute) presigned URL which allows the client to upload the image
        // directly to storage, bypassing the application server.
        .route("/upload/presigned", post(handlers::get_presigned_url))
}
