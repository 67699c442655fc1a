use crate::models::{
    Aktivitas, CreateAktivitasRequest, CreateKeluargaRequest, CreatePendudukRequest,
    CreatePengumumanRequest, DashboardStats, Keluarga, KeluargaResponse, NewUser, Penduduk,
    Pengumuman, UpdateAktivitasRequest, UpdatePendudukRequest, UpdatePengumumanRequest, User,
    UserCredentials,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Memory).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable and usable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Penduduk (resident registry) ---
    // Listing with optional free-text search across nama, NIK and alamat.
    async fn list_penduduk(&self, search: Option<String>) -> Vec<Penduduk>;
    async fn get_penduduk(&self, id: Uuid) -> Option<Penduduk>;
    // Resolves the resident record linked to a portal account, if any.
    async fn get_penduduk_by_user(&self, user_id: Uuid) -> Option<Penduduk>;
    async fn create_penduduk(&self, req: CreatePendudukRequest, user_id: Option<Uuid>)
    -> Penduduk;
    // Partial update via COALESCE; returns None when the record does not exist.
    async fn update_penduduk(&self, id: Uuid, req: UpdatePendudukRequest) -> Option<Penduduk>;
    async fn delete_penduduk(&self, id: Uuid) -> bool;

    // --- Keluarga (household cards) ---
    // Enriched listing: every card with its member list and count.
    async fn list_keluarga(&self) -> Vec<KeluargaResponse>;
    async fn get_keluarga(&self, id: Uuid) -> Option<KeluargaResponse>;
    // "Keluarga saya": the household of the resident linked to this account.
    async fn get_keluarga_by_user(&self, user_id: Uuid) -> Option<KeluargaResponse>;
    async fn create_keluarga(&self, req: CreateKeluargaRequest) -> Keluarga;
    // Links a resident to a freshly registered card as its head (status KK).
    async fn attach_kepala_keluarga(&self, penduduk_id: Uuid, keluarga_id: Uuid) -> bool;

    // --- Aktivitas (activity scheduling) ---
    async fn list_aktivitas(&self, status: Option<String>) -> Vec<Aktivitas>;
    async fn get_aktivitas(&self, id: Uuid) -> Option<Aktivitas>;
    async fn create_aktivitas(&self, req: CreateAktivitasRequest) -> Aktivitas;
    async fn update_aktivitas(&self, id: Uuid, req: UpdateAktivitasRequest) -> Option<Aktivitas>;
    async fn delete_aktivitas(&self, id: Uuid) -> bool;

    // --- Pengumuman (announcements) ---
    async fn list_pengumuman(&self, kategori: Option<String>) -> Vec<Pengumuman>;
    // The author's identity is resolved by the handler and denormalized here.
    async fn create_pengumuman(
        &self,
        req: CreatePengumumanRequest,
        user_id: Uuid,
        nama_penulis: String,
    ) -> Pengumuman;
    async fn update_pengumuman(&self, id: Uuid, req: UpdatePengumumanRequest)
    -> Option<Pengumuman>;
    async fn delete_pengumuman(&self, id: Uuid) -> bool;

    // --- Accounts ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Login path only: the returned row carries the password hash.
    async fn get_user_by_email(&self, email: &str) -> Option<UserCredentials>;
    // Returns None when the email is already taken.
    async fn create_user(&self, user: NewUser) -> Option<User>;
    // Startup seeding check: does any administrator account exist yet?
    async fn has_admin(&self) -> bool;

    // --- Dashboard ---
    async fn get_stats(&self) -> DashboardStats;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database (see db/schema.sql for the reference schema).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PENDUDUK_COLUMNS: &str = "id, user_id, keluarga_id, nik, nama, jenis_kelamin, ttl, agama, \
     alamat, rt, rw, pekerjaan, status_perkawinan, kewarganegaraan, no_telepon, status_keluarga, \
     foto, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    /// list_penduduk
    ///
    /// Implements flexible search using QueryBuilder for safe parameterization,
    /// adhering to the **"No SQL Injection Risk"** mandate. The search string
    /// matches case-insensitively against nama, NIK and alamat.
    async fn list_penduduk(&self, search: Option<String>) -> Vec<Penduduk> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {PENDUDUK_COLUMNS} FROM penduduk"));

        if let Some(s) = search {
            let search_pattern = format!("%{}%", s);
            builder.push(" WHERE (nama ILIKE ");
            builder.push_bind(search_pattern.clone());
            builder.push(" OR nik ILIKE ");
            builder.push_bind(search_pattern.clone());
            builder.push(" OR alamat ILIKE ");
            builder.push_bind(search_pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY nama ASC");

        let query = builder.build_query_as::<Penduduk>();

        match query.fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("list_penduduk error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_penduduk(&self, id: Uuid) -> Option<Penduduk> {
        sqlx::query_as::<_, Penduduk>(&format!(
            "SELECT {PENDUDUK_COLUMNS} FROM penduduk WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_penduduk error: {:?}", e);
            None
        })
    }

    async fn get_penduduk_by_user(&self, user_id: Uuid) -> Option<Penduduk> {
        sqlx::query_as::<_, Penduduk>(&format!(
            "SELECT {PENDUDUK_COLUMNS} FROM penduduk WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_penduduk_by_user error: {:?}", e);
            None
        })
    }

    /// create_penduduk
    ///
    /// Inserts a new resident record. `user_id` is present when the record is
    /// created by (and linked to) a portal account completing its own profile.
    async fn create_penduduk(
        &self,
        req: CreatePendudukRequest,
        user_id: Option<Uuid>,
    ) -> Penduduk {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, Penduduk>(&format!(
            "INSERT INTO penduduk (id, user_id, keluarga_id, nik, nama, jenis_kelamin, ttl, \
             agama, alamat, rt, rw, pekerjaan, status_perkawinan, kewarganegaraan, no_telepon, \
             status_keluarga, foto, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             NOW(), NOW()) RETURNING {PENDUDUK_COLUMNS}"
        ))
        .bind(new_id)
        .bind(user_id)
        .bind(req.keluarga_id)
        .bind(req.nik)
        .bind(req.nama)
        .bind(req.jenis_kelamin)
        .bind(req.ttl)
        .bind(req.agama)
        .bind(req.alamat)
        .bind(req.rt)
        .bind(req.rw)
        .bind(req.pekerjaan)
        .bind(req.status_perkawinan)
        .bind(req.kewarganegaraan)
        .bind(req.no_telepon)
        .bind(req.status_keluarga)
        .bind(req.foto_key)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert penduduk")
    }

    /// update_penduduk
    ///
    /// Uses the PostgreSQL `COALESCE` function to efficiently handle `Option<T>`
    /// fields, only updating a column if the corresponding field in `req` is `Some`.
    async fn update_penduduk(&self, id: Uuid, req: UpdatePendudukRequest) -> Option<Penduduk> {
        sqlx::query_as::<_, Penduduk>(&format!(
            "UPDATE penduduk \
             SET nama = COALESCE($2, nama), \
                 alamat = COALESCE($3, alamat), \
                 rt = COALESCE($4, rt), \
                 rw = COALESCE($5, rw), \
                 pekerjaan = COALESCE($6, pekerjaan), \
                 status_perkawinan = COALESCE($7, status_perkawinan), \
                 no_telepon = COALESCE($8, no_telepon), \
                 status_keluarga = COALESCE($9, status_keluarga), \
                 foto = COALESCE($10, foto), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {PENDUDUK_COLUMNS}"
        ))
        .bind(id)
        .bind(req.nama)
        .bind(req.alamat)
        .bind(req.rt)
        .bind(req.rw)
        .bind(req.pekerjaan)
        .bind(req.status_perkawinan)
        .bind(req.no_telepon)
        .bind(req.status_keluarga)
        .bind(req.foto_key)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_penduduk error: {:?}", e);
            None
        })
    }

    async fn delete_penduduk(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM penduduk WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_penduduk error: {:?}", e);
                false
            }
        }
    }

    /// list_keluarga
    ///
    /// Administrative listing of every household card, each enriched with its
    /// member list. Volumes here are neighborhood-scale, so the per-card member
    /// query is acceptable and keeps the queries trivially reviewable.
    async fn list_keluarga(&self) -> Vec<KeluargaResponse> {
        let cards = match sqlx::query_as::<_, Keluarga>(
            "SELECT id, no_kk, kepala_keluarga, alamat_kk, created_at FROM keluarga \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(k) => k,
            Err(e) => {
                tracing::error!("list_keluarga error: {:?}", e);
                return vec![];
            }
        };

        let mut out = Vec::with_capacity(cards.len());
        for card in cards {
            out.push(self.assemble_keluarga(card).await);
        }
        out
    }

    async fn get_keluarga(&self, id: Uuid) -> Option<KeluargaResponse> {
        let card = sqlx::query_as::<_, Keluarga>(
            "SELECT id, no_kk, kepala_keluarga, alamat_kk, created_at FROM keluarga WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_keluarga error: {:?}", e);
            None
        })?;

        Some(self.assemble_keluarga(card).await)
    }

    /// get_keluarga_by_user
    ///
    /// Resolves account → resident record → household card, the "keluarga saya"
    /// view a resident sees on their dashboard.
    async fn get_keluarga_by_user(&self, user_id: Uuid) -> Option<KeluargaResponse> {
        let keluarga_id = self.get_penduduk_by_user(user_id).await?.keluarga_id?;
        self.get_keluarga(keluarga_id).await
    }

    async fn create_keluarga(&self, req: CreateKeluargaRequest) -> Keluarga {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, Keluarga>(
            "INSERT INTO keluarga (id, no_kk, kepala_keluarga, alamat_kk, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING id, no_kk, kepala_keluarga, alamat_kk, created_at",
        )
        .bind(new_id)
        .bind(req.no_kk)
        .bind(req.kepala_keluarga)
        .bind(req.alamat_kk)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert keluarga")
    }

    async fn attach_kepala_keluarga(&self, penduduk_id: Uuid, keluarga_id: Uuid) -> bool {
        match sqlx::query(
            "UPDATE penduduk SET keluarga_id = $2, status_keluarga = 'KK', updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(penduduk_id)
        .bind(keluarga_id)
        .execute(&self.pool)
        .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("attach_kepala_keluarga error: {:?}", e);
                false
            }
        }
    }

    /// list_aktivitas
    ///
    /// Schedule listing, optionally narrowed to one status
    /// (AKAN_DATANG / BERLANGSUNG / SELESAI). Ordered by occurrence.
    async fn list_aktivitas(&self, status: Option<String>) -> Vec<Aktivitas> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, judul, kategori, status, deskripsi, tanggal, jam, tempat, \
             penyelenggara, created_at, updated_at FROM aktivitas",
        );

        if let Some(s) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(s);
        }

        builder.push(" ORDER BY tanggal ASC, jam ASC");

        match builder.build_query_as::<Aktivitas>().fetch_all(&self.pool).await {
            Ok(a) => a,
            Err(e) => {
                tracing::error!("list_aktivitas error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_aktivitas(&self, id: Uuid) -> Option<Aktivitas> {
        sqlx::query_as::<_, Aktivitas>(
            "SELECT id, judul, kategori, status, deskripsi, tanggal, jam, tempat, \
             penyelenggara, created_at, updated_at FROM aktivitas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_aktivitas error: {:?}", e);
            None
        })
    }

    async fn create_aktivitas(&self, req: CreateAktivitasRequest) -> Aktivitas {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, Aktivitas>(
            "INSERT INTO aktivitas (id, judul, kategori, status, deskripsi, tanggal, jam, \
             tempat, penyelenggara, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING id, judul, kategori, status, deskripsi, tanggal, jam, tempat, \
             penyelenggara, created_at, updated_at",
        )
        .bind(new_id)
        .bind(req.judul)
        .bind(req.kategori)
        .bind(req.status)
        .bind(req.deskripsi)
        .bind(req.tanggal)
        .bind(req.jam)
        .bind(req.tempat)
        .bind(req.penyelenggara)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert aktivitas")
    }

    async fn update_aktivitas(&self, id: Uuid, req: UpdateAktivitasRequest) -> Option<Aktivitas> {
        sqlx::query_as::<_, Aktivitas>(
            "UPDATE aktivitas \
             SET judul = COALESCE($2, judul), \
                 kategori = COALESCE($3, kategori), \
                 status = COALESCE($4, status), \
                 deskripsi = COALESCE($5, deskripsi), \
                 tanggal = COALESCE($6, tanggal), \
                 jam = COALESCE($7, jam), \
                 tempat = COALESCE($8, tempat), \
                 penyelenggara = COALESCE($9, penyelenggara), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, judul, kategori, status, deskripsi, tanggal, jam, tempat, \
             penyelenggara, created_at, updated_at",
        )
        .bind(id)
        .bind(req.judul)
        .bind(req.kategori)
        .bind(req.status)
        .bind(req.deskripsi)
        .bind(req.tanggal)
        .bind(req.jam)
        .bind(req.tempat)
        .bind(req.penyelenggara)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_aktivitas error: {:?}", e);
            None
        })
    }

    async fn delete_aktivitas(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM aktivitas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_aktivitas error: {:?}", e);
                false
            }
        }
    }

    /// list_pengumuman
    ///
    /// Newest first, optionally narrowed to one kategori
    /// (INFORMASI / PENTING / DARURAT).
    async fn list_pengumuman(&self, kategori: Option<String>) -> Vec<Pengumuman> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, user_id, judul, kategori, deskripsi, tanggal, nama_penulis \
             FROM pengumuman",
        );

        if let Some(k) = kategori {
            builder.push(" WHERE kategori = ");
            builder.push_bind(k);
        }

        builder.push(" ORDER BY tanggal DESC");

        match builder.build_query_as::<Pengumuman>().fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("list_pengumuman error: {:?}", e);
                vec![]
            }
        }
    }

    async fn create_pengumuman(
        &self,
        req: CreatePengumumanRequest,
        user_id: Uuid,
        nama_penulis: String,
    ) -> Pengumuman {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, Pengumuman>(
            "INSERT INTO pengumuman (id, user_id, judul, kategori, deskripsi, tanggal, \
             nama_penulis) VALUES ($1, $2, $3, $4, $5, NOW(), $6) \
             RETURNING id, user_id, judul, kategori, deskripsi, tanggal, nama_penulis",
        )
        .bind(new_id)
        .bind(user_id)
        .bind(req.judul)
        .bind(req.kategori)
        .bind(req.deskripsi)
        .bind(nama_penulis)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert pengumuman")
    }

    async fn update_pengumuman(
        &self,
        id: Uuid,
        req: UpdatePengumumanRequest,
    ) -> Option<Pengumuman> {
        sqlx::query_as::<_, Pengumuman>(
            "UPDATE pengumuman \
             SET judul = COALESCE($2, judul), \
                 kategori = COALESCE($3, kategori), \
                 deskripsi = COALESCE($4, deskripsi) \
             WHERE id = $1 \
             RETURNING id, user_id, judul, kategori, deskripsi, tanggal, nama_penulis",
        )
        .bind(id)
        .bind(req.judul)
        .bind(req.kategori)
        .bind(req.deskripsi)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_pengumuman error: {:?}", e);
            None
        })
    }

    async fn delete_pengumuman(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM pengumuman WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_pengumuman error: {:?}", e);
                false
            }
        }
    }

    /// get_user
    ///
    /// Retrieves account data (ID, email, role) needed for authentication and
    /// authorization. Deliberately excludes the password hash.
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or(None)
    }

    async fn get_user_by_email(&self, email: &str) -> Option<UserCredentials> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_by_email error: {:?}", e);
            None
        })
    }

    /// create_user
    ///
    /// Inserts a new account. `ON CONFLICT DO NOTHING` on the email uniqueness
    /// constraint makes the duplicate case a clean `None` instead of an error.
    async fn create_user(&self, user: NewUser) -> Option<User> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, role, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT (email) DO NOTHING \
             RETURNING id, email, role",
        )
        .bind(new_id)
        .bind(user.email)
        .bind(user.role.to_string())
        .bind(user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_user error: {:?}", e);
            None
        })
    }

    async fn has_admin(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
            > 0
    }

    /// get_stats
    ///
    /// Compiles all necessary counters for the administrative dashboard in a
    /// single call.
    async fn get_stats(&self) -> DashboardStats {
        let total_penduduk = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM penduduk")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let total_keluarga = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM keluarga")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let aktivitas_akan_datang = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM aktivitas WHERE status = 'AKAN_DATANG'",
        )
        .fetch_one(&self.pool)
        .await
        .unwrap_or(0);
        let total_pengumuman = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pengumuman")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        DashboardStats {
            total_penduduk,
            total_keluarga,
            aktivitas_akan_datang,
            total_pengumuman,
        }
    }
}

impl PostgresRepository {
    /// Attaches the member list and count to a bare household card row.
    async fn assemble_keluarga(&self, card: Keluarga) -> KeluargaResponse {
        let members = sqlx::query_as::<_, Penduduk>(&format!(
            "SELECT {PENDUDUK_COLUMNS} FROM penduduk WHERE keluarga_id = $1 \
             ORDER BY (status_keluarga = 'KK') DESC, nama ASC"
        ))
        .bind(card.id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("assemble_keluarga error: {:?}", e);
            vec![]
        });

        KeluargaResponse {
            id: card.id,
            no_kk: card.no_kk,
            kepala_keluarga: card.kepala_keluarga,
            alamat_kk: card.alamat_kk,
            jumlah_anggota: members.len() as i64,
            penduduk: members,
        }
    }
}

// --- In-Memory Implementation (For Tests) ---

/// MemoryRepository
///
/// An in-memory implementation of the `Repository` trait used by the test suite,
/// mirroring the role `MockStorageService` plays for the storage seam. Keeps the
/// integration tests hermetic: the full router, auth flow and route gate can be
/// exercised without a running Postgres.
#[derive(Default)]
pub struct MemoryRepository {
    users: Mutex<Vec<UserCredentials>>,
    penduduk: Mutex<Vec<Penduduk>>,
    keluarga: Mutex<Vec<Keluarga>>,
    aktivitas: Mutex<Vec<Aktivitas>>,
    pengumuman: Mutex<Vec<Pengumuman>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(m: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
        m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn members_of(&self, keluarga_id: Uuid) -> Vec<Penduduk> {
        let mut members: Vec<Penduduk> = Self::lock(&self.penduduk)
            .iter()
            .filter(|p| p.keluarga_id == Some(keluarga_id))
            .cloned()
            .collect();
        // Head of household first, then by name, matching the Postgres ordering.
        members.sort_by(|a, b| {
            (b.status_keluarga == "KK")
                .cmp(&(a.status_keluarga == "KK"))
                .then_with(|| a.nama.cmp(&b.nama))
        });
        members
    }

    fn assemble(&self, card: Keluarga) -> KeluargaResponse {
        let members = self.members_of(card.id);
        KeluargaResponse {
            id: card.id,
            no_kk: card.no_kk,
            kepala_keluarga: card.kepala_keluarga,
            alamat_kk: card.alamat_kk,
            jumlah_anggota: members.len() as i64,
            penduduk: members,
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_penduduk(&self, search: Option<String>) -> Vec<Penduduk> {
        let needle = search.map(|s| s.to_lowercase());
        let mut rows: Vec<Penduduk> = Self::lock(&self.penduduk)
            .iter()
            .filter(|p| match &needle {
                Some(n) => {
                    p.nama.to_lowercase().contains(n)
                        || p.nik.to_lowercase().contains(n)
                        || p.alamat.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.nama.cmp(&b.nama));
        rows
    }

    async fn get_penduduk(&self, id: Uuid) -> Option<Penduduk> {
        Self::lock(&self.penduduk).iter().find(|p| p.id == id).cloned()
    }

    async fn get_penduduk_by_user(&self, user_id: Uuid) -> Option<Penduduk> {
        Self::lock(&self.penduduk)
            .iter()
            .find(|p| p.user_id == Some(user_id))
            .cloned()
    }

    async fn create_penduduk(
        &self,
        req: CreatePendudukRequest,
        user_id: Option<Uuid>,
    ) -> Penduduk {
        let now = Utc::now();
        let record = Penduduk {
            id: Uuid::new_v4(),
            user_id,
            keluarga_id: req.keluarga_id,
            nik: req.nik,
            nama: req.nama,
            jenis_kelamin: req.jenis_kelamin,
            ttl: req.ttl,
            agama: req.agama,
            alamat: req.alamat,
            rt: req.rt,
            rw: req.rw,
            pekerjaan: req.pekerjaan,
            status_perkawinan: req.status_perkawinan,
            kewarganegaraan: req.kewarganegaraan,
            no_telepon: req.no_telepon,
            status_keluarga: req.status_keluarga,
            foto: req.foto_key,
            created_at: now,
            updated_at: now,
        };
        Self::lock(&self.penduduk).push(record.clone());
        record
    }

    async fn update_penduduk(&self, id: Uuid, req: UpdatePendudukRequest) -> Option<Penduduk> {
        let mut rows = Self::lock(&self.penduduk);
        let record = rows.iter_mut().find(|p| p.id == id)?;
        if let Some(v) = req.nama {
            record.nama = v;
        }
        if let Some(v) = req.alamat {
            record.alamat = v;
        }
        if let Some(v) = req.rt {
            record.rt = v;
        }
        if let Some(v) = req.rw {
            record.rw = v;
        }
        if let Some(v) = req.pekerjaan {
            record.pekerjaan = v;
        }
        if let Some(v) = req.status_perkawinan {
            record.status_perkawinan = v;
        }
        if let Some(v) = req.no_telepon {
            record.no_telepon = v;
        }
        if let Some(v) = req.status_keluarga {
            record.status_keluarga = v;
        }
        if let Some(v) = req.foto_key {
            record.foto = Some(v);
        }
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    async fn delete_penduduk(&self, id: Uuid) -> bool {
        let mut rows = Self::lock(&self.penduduk);
        let before = rows.len();
        rows.retain(|p| p.id != id);
        rows.len() < before
    }

    async fn list_keluarga(&self) -> Vec<KeluargaResponse> {
        let mut cards: Vec<Keluarga> = Self::lock(&self.keluarga).clone();
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cards.into_iter().map(|c| self.assemble(c)).collect()
    }

    async fn get_keluarga(&self, id: Uuid) -> Option<KeluargaResponse> {
        let card = Self::lock(&self.keluarga).iter().find(|k| k.id == id).cloned()?;
        Some(self.assemble(card))
    }

    async fn get_keluarga_by_user(&self, user_id: Uuid) -> Option<KeluargaResponse> {
        let keluarga_id = self.get_penduduk_by_user(user_id).await?.keluarga_id?;
        self.get_keluarga(keluarga_id).await
    }

    async fn create_keluarga(&self, req: CreateKeluargaRequest) -> Keluarga {
        let card = Keluarga {
            id: Uuid::new_v4(),
            no_kk: req.no_kk,
            kepala_keluarga: req.kepala_keluarga,
            alamat_kk: req.alamat_kk,
            created_at: Utc::now(),
        };
        Self::lock(&self.keluarga).push(card.clone());
        card
    }

    async fn attach_kepala_keluarga(&self, penduduk_id: Uuid, keluarga_id: Uuid) -> bool {
        let mut rows = Self::lock(&self.penduduk);
        match rows.iter_mut().find(|p| p.id == penduduk_id) {
            Some(record) => {
                record.keluarga_id = Some(keluarga_id);
                record.status_keluarga = "KK".to_string();
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    async fn list_aktivitas(&self, status: Option<String>) -> Vec<Aktivitas> {
        let mut rows: Vec<Aktivitas> = Self::lock(&self.aktivitas)
            .iter()
            .filter(|a| status.as_ref().is_none_or(|s| &a.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.tanggal.cmp(&b.tanggal).then_with(|| a.jam.cmp(&b.jam)));
        rows
    }

    async fn get_aktivitas(&self, id: Uuid) -> Option<Aktivitas> {
        Self::lock(&self.aktivitas).iter().find(|a| a.id == id).cloned()
    }

    async fn create_aktivitas(&self, req: CreateAktivitasRequest) -> Aktivitas {
        let now = Utc::now();
        let record = Aktivitas {
            id: Uuid::new_v4(),
            judul: req.judul,
            kategori: req.kategori,
            status: req.status,
            deskripsi: req.deskripsi,
            tanggal: req.tanggal,
            jam: req.jam,
            tempat: req.tempat,
            penyelenggara: req.penyelenggara,
            created_at: now,
            updated_at: now,
        };
        Self::lock(&self.aktivitas).push(record.clone());
        record
    }

    async fn update_aktivitas(&self, id: Uuid, req: UpdateAktivitasRequest) -> Option<Aktivitas> {
        let mut rows = Self::lock(&self.aktivitas);
        let record = rows.iter_mut().find(|a| a.id == id)?;
        if let Some(v) = req.judul {
            record.judul = v;
        }
        if let Some(v) = req.kategori {
            record.kategori = v;
        }
        if let Some(v) = req.status {
            record.status = v;
        }
        if let Some(v) = req.deskripsi {
            record.deskripsi = v;
        }
        if let Some(v) = req.tanggal {
            record.tanggal = v;
        }
        if let Some(v) = req.jam {
            record.jam = v;
        }
        if let Some(v) = req.tempat {
            record.tempat = v;
        }
        if let Some(v) = req.penyelenggara {
            record.penyelenggara = v;
        }
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    async fn delete_aktivitas(&self, id: Uuid) -> bool {
        let mut rows = Self::lock(&self.aktivitas);
        let before = rows.len();
        rows.retain(|a| a.id != id);
        rows.len() < before
    }

    async fn list_pengumuman(&self, kategori: Option<String>) -> Vec<Pengumuman> {
        let mut rows: Vec<Pengumuman> = Self::lock(&self.pengumuman)
            .iter()
            .filter(|p| kategori.as_ref().is_none_or(|k| &p.kategori == k))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.tanggal.cmp(&a.tanggal));
        rows
    }

    async fn create_pengumuman(
        &self,
        req: CreatePengumumanRequest,
        user_id: Uuid,
        nama_penulis: String,
    ) -> Pengumuman {
        let record = Pengumuman {
            id: Uuid::new_v4(),
            user_id,
            judul: req.judul,
            kategori: req.kategori,
            deskripsi: req.deskripsi,
            tanggal: Utc::now(),
            nama_penulis,
        };
        Self::lock(&self.pengumuman).push(record.clone());
        record
    }

    async fn update_pengumuman(
        &self,
        id: Uuid,
        req: UpdatePengumumanRequest,
    ) -> Option<Pengumuman> {
        let mut rows = Self::lock(&self.pengumuman);
        let record = rows.iter_mut().find(|p| p.id == id)?;
        if let Some(v) = req.judul {
            record.judul = v;
        }
        if let Some(v) = req.kategori {
            record.kategori = v;
        }
        if let Some(v) = req.deskripsi {
            record.deskripsi = v;
        }
        Some(record.clone())
    }

    async fn delete_pengumuman(&self, id: Uuid) -> bool {
        let mut rows = Self::lock(&self.pengumuman);
        let before = rows.len();
        rows.retain(|p| p.id != id);
        rows.len() < before
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        Self::lock(&self.users).iter().find(|u| u.id == id).map(|u| User {
            id: u.id,
            email: u.email.clone(),
            role: u.role.clone(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<UserCredentials> {
        Self::lock(&self.users).iter().find(|u| u.email == email).cloned()
    }

    async fn create_user(&self, user: NewUser) -> Option<User> {
        let mut users = Self::lock(&self.users);
        if users.iter().any(|u| u.email == user.email) {
            return None;
        }
        let row = UserCredentials {
            id: Uuid::new_v4(),
            email: user.email,
            role: user.role.to_string(),
            password_hash: user.password_hash,
        };
        users.push(row.clone());
        Some(User {
            id: row.id,
            email: row.email,
            role: row.role,
        })
    }

    async fn has_admin(&self) -> bool {
        Self::lock(&self.users).iter().any(|u| u.role == "ADMIN")
    }

    async fn get_stats(&self) -> DashboardStats {
        DashboardStats {
            total_penduduk: Self::lock(&self.penduduk).len() as i64,
            total_keluarga: Self::lock(&self.keluarga).len() as i64,
            aktivitas_akan_datang: Self::lock(&self.aktivitas)
                .iter()
                .filter(|a| a.status == "AKAN_DATANG")
                .count() as i64,
            total_pengumuman: Self::lock(&self.pengumuman).len() as i64,
        }
    }
}
