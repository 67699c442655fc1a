use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Session Role ---

/// Role
///
/// The closed set of session role classes gating navigation and API access.
/// Modeled as a tagged enum rather than a free string so that an unknown or
/// garbled label can never be carried around as a live role: parsing happens
/// once, at the login/session boundary, and fails loudly there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    /// Administrative staff (pengurus RT/RW). Full registry access.
    Admin,
    /// Resident account. Sees the resident-facing portal and its own household.
    #[default]
    Warga,
}

impl Role {
    /// The page a freshly authenticated session of this role lands on.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Warga => "/user/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::Warga => f.write_str("WARGA"),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    /// Accepts only the two wire labels. Anything else is an error, forcing
    /// callers to decide what a missing/unknown role means at the boundary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "WARGA" => Ok(Role::Warga),
            _ => Err(()),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the account's canonical identity record stored in the `users` table.
/// This structure includes the minimal required data resolved during authentication;
/// the password hash deliberately lives in the separate, non-serializable
/// `UserCredentials` so it can never leak into a response body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // The account's primary identifier.
    pub email: String,
    // The RBAC label: "ADMIN" or "WARGA". Parsed into `Role` at the auth boundary.
    pub role: String,
}

/// UserCredentials
///
/// Internal row used exclusively by the login flow. Carries the Argon2 PHC hash
/// and therefore must never derive Serialize.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

/// NewUser
///
/// Insertion payload for the `users` table. Constructed server-side only
/// (registration handler or the startup admin seed), never deserialized from a client.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Penduduk
///
/// A resident record from the `penduduk` table. This is the primary data structure
/// of the registry; field names follow the portal wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Penduduk {
    pub id: Uuid,
    // FK to users.id when the resident has a portal account.
    pub user_id: Option<Uuid>,
    // FK to keluarga.id; a resident may exist before being attached to a household card.
    pub keluarga_id: Option<Uuid>,
    // National identity number. Stored as text to preserve leading zeros.
    pub nik: String,
    pub nama: String,
    // "L" (laki-laki) or "P" (perempuan).
    pub jenis_kelamin: String,
    // Tempat, tanggal lahir as a single display string (e.g. "Bandung, 17-08-1990").
    pub ttl: String,
    pub agama: String,
    pub alamat: String,
    pub rt: i32,
    pub rw: i32,
    pub pekerjaan: String,
    pub status_perkawinan: String,
    pub kewarganegaraan: String,
    pub no_telepon: String,
    // Position on the household card: "KK" (head) or "ANGGOTA" (member).
    pub status_keluarga: String,
    // Storage object key of the profile photo, if one was uploaded.
    pub foto: Option<String>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Keluarga
///
/// A household card (Kartu Keluarga) record from the `keluarga` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Keluarga {
    pub id: Uuid,
    // Household card number. Text for the same leading-zero reason as NIK.
    pub no_kk: String,
    pub kepala_keluarga: String,
    pub alamat_kk: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// KeluargaResponse
///
/// Enriched household payload for the portal: the card plus its member list and
/// count, assembled by the repository from `keluarga` joined with `penduduk`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct KeluargaResponse {
    pub id: Uuid,
    pub no_kk: String,
    pub kepala_keluarga: String,
    pub alamat_kk: String,
    pub jumlah_anggota: i64,
    pub penduduk: Vec<Penduduk>,
}

/// Aktivitas
///
/// A scheduled neighborhood activity from the `aktivitas` table.
/// Kategori is one of RAPAT | KERJA_BAKTI | ACARA; status is one of
/// AKAN_DATANG | BERLANGSUNG | SELESAI.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Aktivitas {
    pub id: Uuid,
    pub judul: String,
    pub kategori: String,
    pub status: String,
    pub deskripsi: String,
    #[ts(type = "string")]
    pub tanggal: NaiveDate,
    #[ts(type = "string")]
    pub jam: NaiveTime,
    pub tempat: String,
    pub penyelenggara: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Pengumuman
///
/// An announcement from the `pengumuman` table. Kategori is one of
/// INFORMASI | PENTING | DARURAT. `nama_penulis` is denormalized at creation
/// time from the author's profile so the list view needs no join.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Pengumuman {
    pub id: Uuid,
    // FK to users.id (author).
    pub user_id: Uuid,
    pub judul: String,
    pub kategori: String,
    pub deskripsi: String,
    #[ts(type = "string")]
    pub tanggal: DateTime<Utc>,
    pub nama_penulis: String,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for POST /api/auth/login. The password is verified against the
/// stored Argon2 hash and never persisted or logged in clear text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /api/auth/register).
/// Registration always creates a WARGA account; there is intentionally no role
/// field here; administrator accounts are seeded from configuration at startup.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub nama: String,
}

/// CreatePendudukRequest
///
/// Input payload for adding a resident to the registry. `foto_key` is the storage
/// key obtained from the presigned upload flow, if a photo was uploaded first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePendudukRequest {
    pub nik: String,
    pub nama: String,
    pub jenis_kelamin: String,
    pub ttl: String,
    pub agama: String,
    pub alamat: String,
    pub rt: i32,
    pub rw: i32,
    pub pekerjaan: String,
    pub status_perkawinan: String,
    pub kewarganegaraan: String,
    pub no_telepon: String,
    pub status_keluarga: String,
    pub keluarga_id: Option<Uuid>,
    pub foto_key: Option<String>,
}

/// UpdatePendudukRequest
///
/// Partial update payload for a resident record.
///
/// *Optimization*: Uses `Option<T>` for all fields and
/// `#[serde(skip_serializing_if = "Option::is_none")]` to efficiently handle partial
/// updates, ensuring only provided fields are included in the JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePendudukRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nama: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alamat: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rw: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pekerjaan: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_perkawinan: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_telepon: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_keluarga: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub foto_key: Option<String>,
}

/// CreateKeluargaRequest
///
/// Input payload for registering a new household card.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateKeluargaRequest {
    pub no_kk: String,
    pub kepala_keluarga: String,
    pub alamat_kk: String,
}

/// CreateAktivitasRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateAktivitasRequest {
    pub judul: String,
    pub kategori: String,
    pub status: String,
    pub deskripsi: String,
    #[ts(type = "string")]
    pub tanggal: NaiveDate,
    #[ts(type = "string")]
    pub jam: NaiveTime,
    pub tempat: String,
    pub penyelenggara: String,
}

/// UpdateAktivitasRequest
///
/// Partial update for an activity; the common case is advancing `status`
/// (AKAN_DATANG → BERLANGSUNG → SELESAI) without touching the rest.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAktivitasRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judul: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kategori: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deskripsi: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string")]
    pub tanggal: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string")]
    pub jam: Option<NaiveTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempat: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub penyelenggara: Option<String>,
}

/// CreatePengumumanRequest
///
/// The author and publication date are filled in server-side from the
/// authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePengumumanRequest {
    pub judul: String,
    pub kategori: String,
    pub deskripsi: String,
}

/// UpdatePengumumanRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePengumumanRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judul: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kategori: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deskripsi: Option<String>,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived storage upload URL
/// (POST /api/upload/presigned). The server uses these fields to set security
/// constraints on the generated URL.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "pas_foto.jpg")]
    pub filename: String,
    /// The MIME type, used to constrain the storage upload to the allowed type.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// Output schema containing the secure, temporary URL for client-to-cloud file
/// transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The storage object key where the file will land (referenced as `foto`).
    pub resource_key: String,
}

/// --- Dashboard & Profile Schemas (Output) ---

/// DashboardStats
///
/// Output schema for the administrative statistics dashboard (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_penduduk: i64,
    pub total_keluarga: i64,
    /// Activities still in status AKAN_DATANG.
    pub aktivitas_akan_datang: i64,
    pub total_pengumuman: i64,
}

/// UserProfile
///
/// Output schema for the authenticated account's profile (GET /api/auth/me).
/// The portal reads `role` from this response to decide which navigation to render.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    /// Display name from the linked resident record, when one exists.
    pub nama: Option<String>,
    /// Profile photo URL; falls back to a generated avatar when no photo exists.
    pub foto_url: Option<String>,
}

/// LoginResponse
///
/// Output schema for a successful login. The token doubles as the `token` cookie
/// value; the role is mirrored into the `role` cookie for client-side rendering
/// decisions (the server never trusts that mirror).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user: UserProfile,
}
