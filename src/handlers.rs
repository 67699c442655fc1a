use crate::{
    AppState,
    auth::{self, AuthUser},
    gate::{ROLE_COOKIE, TOKEN_COOKIE},
    models::{
        self, Aktivitas, CreateAktivitasRequest, CreateKeluargaRequest, CreatePendudukRequest,
        CreatePengumumanRequest, DashboardStats, Keluarga, KeluargaResponse, LoginRequest,
        LoginResponse, NewUser, Penduduk, Pengumuman, PresignedUrlRequest, PresignedUrlResponse,
        RegisterRequest, Role, UpdateAktivitasRequest, UpdatePendudukRequest,
        UpdatePengumumanRequest, User, UserProfile,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// PendudukFilter
///
/// Defines the accepted query parameters for the resident listing endpoint
/// (GET /api/penduduk). Used by Axum's Query extractor to safely bind HTTP query
/// parameters for search.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PendudukFilter {
    /// Optional free-text search matched against nama, NIK and alamat.
    pub search: Option<String>,
}

/// AktivitasFilter
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AktivitasFilter {
    /// Optional status filter: AKAN_DATANG, BERLANGSUNG or SELESAI.
    pub status: Option<String>,
}

/// PengumumanFilter
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PengumumanFilter {
    /// Optional kategori filter: INFORMASI, PENTING or DARURAT.
    pub kategori: Option<String>,
}

// --- Shared Helpers ---

/// build_profile
///
/// Assembles the profile payload for an account: role, display name from the
/// linked resident record, and a photo URL (generated avatar fallback when no
/// photo was uploaded, matching what the portal pages rely on).
async fn build_profile(state: &AppState, user: &User, role: Role) -> UserProfile {
    let penduduk = state.repo.get_penduduk_by_user(user.id).await;
    let nama = penduduk.as_ref().map(|p| p.nama.clone());
    let foto_url = match penduduk.as_ref().and_then(|p| p.foto.clone()) {
        Some(key) => Some(state.storage.public_url(&key)),
        None => {
            let seed = nama.clone().unwrap_or_else(|| user.email.clone());
            Some(format!(
                "https://ui-avatars.com/api/?name={}&background=random",
                seed.replace(' ', "+")
            ))
        }
    };

    UserProfile {
        id: user.id,
        email: user.email.clone(),
        role,
        nama,
        foto_url,
    }
}

/// Builds the pair of session cookies handed to the browser at login. The role
/// cookie is a client-side mirror for rendering decisions; the server only ever
/// trusts the token, resolved against the session store.
fn session_cookies(jar: CookieJar, token: &str, role: Role) -> CookieJar {
    jar.add(
        Cookie::build((TOKEN_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .build(),
    )
    .add(
        Cookie::build((ROLE_COOKIE, role.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .build(),
    )
}

// --- Auth Handlers ---

/// login
///
/// [Public Route] Exchanges credentials for an opaque session token.
///
/// *Flow*: Look up the account by email, verify the password against the stored
/// Argon2 hash, issue a session (arming its idle countdown) and hand the token
/// back both in the JSON body (for the `Authorization: Token <raw>` header) and
/// as the `token` cookie (for gated page navigation). Token and role are set
/// together, as a unit.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Unknown email or wrong password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), StatusCode> {
    let creds = state
        .repo
        .get_user_by_email(&payload.email)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth::verify_password(&creds.password_hash, &payload.password) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // An account whose role label no longer parses cannot be given a session.
    let role = creds
        .role
        .parse::<Role>()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = state.sessions.issue(creds.id, role);
    tracing::info!(user_id = %creds.id, %role, "login successful");

    let user = User {
        id: creds.id,
        email: creds.email,
        role: creds.role,
    };
    let profile = build_profile(&state, &user, role).await;

    let jar = session_cookies(jar, &token, role);
    Ok((jar, Json(LoginResponse { token, role, user: profile })))
}

/// logout
///
/// [Authenticated Route] Revokes the session and clears both session cookies as
/// a unit. The token is gone server-side after this call, so a replay of the
/// old credential is indistinguishable from no credential at all.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Session revoked"))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, StatusCode) {
    if let Some(token) = auth::token_from_headers(&headers) {
        state.sessions.revoke(&token);
    }

    let jar = jar
        .remove(Cookie::build((TOKEN_COOKIE, "")).path("/").build())
        .remove(Cookie::build((ROLE_COOKIE, "")).path("/").build());
    (jar, StatusCode::NO_CONTENT)
}

/// register
///
/// [Public Route] Creates a resident account. The role is always WARGA:
/// clients cannot request a role, and administrator accounts exist only via
/// the startup seed. 400 when the email is already registered.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = User),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, StatusCode> {
    let password_hash =
        auth::hash_password(&payload.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let created = state
        .repo
        .create_user(NewUser {
            email: payload.email,
            password_hash,
            role: Role::Warga,
        })
        .await
        .ok_or(StatusCode::BAD_REQUEST)?;

    tracing::info!(user_id = %created.id, "account registered");
    Ok(Json(created))
}

/// get_me
///
/// [Authenticated Route] Provides the authenticated account's profile. The
/// portal reads `role` from this response to decide which navigation to render.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, role }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    let user = state.repo.get_user(id).await.ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(build_profile(&state, &user, role).await))
}

// --- Penduduk Handlers ---

/// get_penduduk_list
///
/// [Authenticated Route] Lists the resident registry with optional search.
#[utoipa::path(
    get,
    path = "/api/penduduk",
    params(PendudukFilter),
    responses((status = 200, description = "Residents", body = [Penduduk]))
)]
pub async fn get_penduduk_list(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PendudukFilter>,
) -> Json<Vec<models::Penduduk>> {
    let rows = state.repo.list_penduduk(filter.search).await;
    Json(rows)
}

/// get_penduduk_detail
///
/// [Authenticated Route] Retrieves a single resident record by ID.
#[utoipa::path(
    get,
    path = "/api/penduduk/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    responses((status = 200, description = "Found", body = Penduduk))
)]
pub async fn get_penduduk_detail(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<models::Penduduk>, StatusCode> {
    match state.repo.get_penduduk(id).await {
        Some(p) => Ok(Json(p)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// create_penduduk
///
/// [Authenticated Route] Adds a resident record.
///
/// *Authorization*: An admin may register any resident against any household
/// card. For a WARGA account the first record created is its **own** profile
/// (completing registration, which links the record to the account); any later
/// record is a family member and is forced onto the caller's own household
/// card, so a resident can never attach people to someone else's card.
#[utoipa::path(
    post,
    path = "/api/penduduk",
    request_body = CreatePendudukRequest,
    responses(
        (status = 200, description = "Created", body = Penduduk),
        (status = 400, description = "No household card to attach to")
    )
)]
pub async fn create_penduduk(
    AuthUser { id: user_id, role }: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<CreatePendudukRequest>,
) -> Result<Json<models::Penduduk>, StatusCode> {
    if role == Role::Admin {
        let created = state.repo.create_penduduk(payload, None).await;
        return Ok(Json(created));
    }

    match state.repo.get_penduduk_by_user(user_id).await {
        // Profile completion: link the new record to the calling account.
        None => {
            let created = state.repo.create_penduduk(payload, Some(user_id)).await;
            Ok(Json(created))
        }
        // Family member: force the record onto the caller's own card.
        Some(own) => {
            let keluarga_id = own.keluarga_id.ok_or(StatusCode::BAD_REQUEST)?;
            payload.keluarga_id = Some(keluarga_id);
            let created = state.repo.create_penduduk(payload, None).await;
            Ok(Json(created))
        }
    }
}

/// update_penduduk
///
/// [Authenticated Route] Modifies a resident record, implementing two tiers of
/// authorization.
///
/// *RBAC/Ownership*: Admins may edit any record (Force Edit); a WARGA account
/// may only edit the record linked to itself (profile edit, photo update).
#[utoipa::path(
    put,
    path = "/api/penduduk/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    request_body = UpdatePendudukRequest,
    responses(
        (status = 200, description = "Updated", body = Penduduk),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_penduduk(
    AuthUser { id: user_id, role }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePendudukRequest>,
) -> Result<Json<models::Penduduk>, StatusCode> {
    if role != Role::Admin {
        // Standard resident edit: enforce the ownership check first.
        let record = state.repo.get_penduduk(id).await.ok_or(StatusCode::NOT_FOUND)?;
        if record.user_id != Some(user_id) {
            return Err(StatusCode::FORBIDDEN);
        }
    }

    match state.repo.update_penduduk(id, payload).await {
        Some(p) => Ok(Json(p)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_penduduk
///
/// [Admin Route] Removes a resident record from the registry.
///
/// *RBAC*: Strict enforcement of the ADMIN role before calling the repository.
#[utoipa::path(
    delete,
    path = "/api/admin/penduduk/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_penduduk(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.delete_penduduk(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Keluarga Handlers ---

/// get_keluarga_saya
///
/// [Authenticated Route] The resident's own household card with its member
/// list, resolved from the caller's linked resident record.
#[utoipa::path(
    get,
    path = "/api/keluarga/saya",
    responses(
        (status = 200, description = "My household card", body = KeluargaResponse),
        (status = 404, description = "No linked household")
    )
)]
pub async fn get_keluarga_saya(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<models::KeluargaResponse>, StatusCode> {
    match state.repo.get_keluarga_by_user(id).await {
        Some(k) => Ok(Json(k)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// create_keluarga_saya
///
/// [Authenticated Route] Registers a household card for the calling resident,
/// completing onboarding. The caller must have finished their profile first;
/// their resident record becomes the card's head (kepala keluarga).
#[utoipa::path(
    post,
    path = "/api/keluarga",
    request_body = CreateKeluargaRequest,
    responses(
        (status = 200, description = "Created", body = Keluarga),
        (status = 400, description = "Profile not completed yet")
    )
)]
pub async fn create_keluarga_saya(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateKeluargaRequest>,
) -> Result<Json<models::Keluarga>, StatusCode> {
    let own = state
        .repo
        .get_penduduk_by_user(user_id)
        .await
        .ok_or(StatusCode::BAD_REQUEST)?;

    let card = state.repo.create_keluarga(payload).await;
    state.repo.attach_kepala_keluarga(own.id, card.id).await;
    Ok(Json(card))
}

/// get_admin_keluarga
///
/// [Admin Route] Lists every household card in the registry with member counts.
#[utoipa::path(
    get,
    path = "/api/admin/keluarga",
    responses((status = 200, description = "All household cards", body = [KeluargaResponse]))
)]
pub async fn get_admin_keluarga(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<models::KeluargaResponse>>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.list_keluarga().await))
}

/// create_keluarga
///
/// [Admin Route] Registers a new household card.
#[utoipa::path(
    post,
    path = "/api/admin/keluarga",
    request_body = CreateKeluargaRequest,
    responses((status = 200, description = "Created", body = Keluarga))
)]
pub async fn create_keluarga(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateKeluargaRequest>,
) -> Result<Json<models::Keluarga>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.create_keluarga(payload).await))
}

// --- Aktivitas Handlers ---

/// get_aktivitas_list
///
/// [Authenticated Route] Lists the activity schedule, optionally filtered by
/// status. Both roles read the same list; only admins may mutate it.
#[utoipa::path(
    get,
    path = "/api/aktivitas",
    params(AktivitasFilter),
    responses((status = 200, description = "Activities", body = [Aktivitas]))
)]
pub async fn get_aktivitas_list(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AktivitasFilter>,
) -> Json<Vec<models::Aktivitas>> {
    Json(state.repo.list_aktivitas(filter.status).await)
}

/// create_aktivitas
///
/// [Admin Route] Schedules a new neighborhood activity.
#[utoipa::path(
    post,
    path = "/api/admin/aktivitas",
    request_body = CreateAktivitasRequest,
    responses((status = 200, description = "Created", body = Aktivitas))
)]
pub async fn create_aktivitas(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAktivitasRequest>,
) -> Result<Json<models::Aktivitas>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.create_aktivitas(payload).await))
}

/// update_aktivitas
///
/// [Admin Route] Edits an activity; the common case is advancing its status.
#[utoipa::path(
    put,
    path = "/api/admin/aktivitas/{id}",
    params(("id" = Uuid, Path, description = "Activity ID")),
    request_body = UpdateAktivitasRequest,
    responses((status = 200, description = "Updated", body = Aktivitas))
)]
pub async fn update_aktivitas(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAktivitasRequest>,
) -> Result<Json<models::Aktivitas>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    match state.repo.update_aktivitas(id, payload).await {
        Some(a) => Ok(Json(a)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_aktivitas
///
/// [Admin Route] Removes an activity from the schedule.
#[utoipa::path(
    delete,
    path = "/api/admin/aktivitas/{id}",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_aktivitas(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.delete_aktivitas(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Pengumuman Handlers ---

/// get_pengumuman_list
///
/// [Authenticated Route] Lists announcements, newest first, optionally filtered
/// by kategori.
#[utoipa::path(
    get,
    path = "/api/pengumuman",
    params(PengumumanFilter),
    responses((status = 200, description = "Announcements", body = [Pengumuman]))
)]
pub async fn get_pengumuman_list(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PengumumanFilter>,
) -> Json<Vec<models::Pengumuman>> {
    Json(state.repo.list_pengumuman(filter.kategori).await)
}

/// create_pengumuman
///
/// [Admin Route] Publishes an announcement. The author's display name is
/// resolved server-side (linked resident name, falling back to the account
/// email) and denormalized onto the record.
#[utoipa::path(
    post,
    path = "/api/admin/pengumuman",
    request_body = CreatePengumumanRequest,
    responses((status = 200, description = "Published", body = Pengumuman))
)]
pub async fn create_pengumuman(
    AuthUser { id: user_id, role }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePengumumanRequest>,
) -> Result<Json<models::Pengumuman>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    let nama_penulis = match state.repo.get_penduduk_by_user(user_id).await {
        Some(p) => p.nama,
        None => state
            .repo
            .get_user(user_id)
            .await
            .map(|u| u.email)
            .unwrap_or_else(|| "Pengurus RT/RW".to_string()),
    };

    Ok(Json(
        state.repo.create_pengumuman(payload, user_id, nama_penulis).await,
    ))
}

/// update_pengumuman
///
/// [Admin Route] Edits an announcement's title, kategori or body.
#[utoipa::path(
    put,
    path = "/api/admin/pengumuman/{id}",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    request_body = UpdatePengumumanRequest,
    responses((status = 200, description = "Updated", body = Pengumuman))
)]
pub async fn update_pengumuman(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePengumumanRequest>,
) -> Result<Json<models::Pengumuman>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    match state.repo.update_pengumuman(id, payload).await {
        Some(p) => Ok(Json(p)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_pengumuman
///
/// [Admin Route] Retracts an announcement.
#[utoipa::path(
    delete,
    path = "/api/admin/pengumuman/{id}",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_pengumuman(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.delete_pengumuman(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Dashboard & Upload Handlers ---

/// get_admin_stats
///
/// [Admin Route] Retrieves core registry counters for the dashboard.
///
/// *Authorization*: Explicitly checks that the role is ADMIN.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn get_admin_stats(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.get_stats().await))
}

/// get_presigned_url
///
/// [Authenticated Route] Generates a temporary, secure URL for direct
/// client-to-storage photo upload.
///
/// *Security*: The URL is short-lived (10 minutes max), constrained to the
/// specified `file_type`, and uses a unique object key (UUID), offloading image
/// uploads from the application server.
#[utoipa::path(
    post,
    path = "/api/upload/presigned",
    request_body = PresignedUrlRequest,
    responses((status = 200, description = "URL", body = PresignedUrlResponse))
)]
pub async fn get_presigned_url(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> impl IntoResponse {
    // Generate a unique, structured object key (e.g., 'foto/UUID.jpg').
    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin");
    let unique_id = Uuid::new_v4();
    let object_key = format!("foto/{}.{}", unique_id, extension);

    match state
        .storage
        // Delegate key generation and mime-type constraint application to the
        // Storage Service.
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
    {
        Ok(url) => {
            let response = PresignedUrlResponse {
                upload_url: url,
                resource_key: object_key,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            // Log the underlying storage error for debugging but return a
            // generic internal error.
            tracing::error!("storage error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed").into_response()
        }
    }
}
