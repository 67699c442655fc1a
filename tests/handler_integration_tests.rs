use sipakerte::{
    AppConfig, AppState, MemoryRepository, MockStorageService, SessionStore, auth, create_router,
    models::{NewUser, Role},
    repository::RepositoryState,
    session::SessionState,
    storage::StorageState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestApp {
    address: String,
    repo: RepositoryState,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig::default();
    let sessions: SessionState = Arc::new(SessionStore::new(config.session_idle));

    let state = AppState {
        repo: repo.clone(),
        storage,
        sessions,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

/// Seeds an account directly through the repository; requests below authenticate
/// with the Env::Local x-user-id bypass to keep the handler tests focused.
async fn seed_user(repo: &RepositoryState, email: &str, role: Role) -> Uuid {
    let password_hash = auth::hash_password("rahasia123").expect("hash fail");
    repo.create_user(NewUser {
        email: email.to_string(),
        password_hash,
        role,
    })
    .await
    .expect("seed user fail")
    .id
}

fn penduduk_payload(nik: &str, nama: &str, keluarga_id: Option<Uuid>) -> serde_json::Value {
    serde_json::json!({
        "nik": nik,
        "nama": nama,
        "jenis_kelamin": "L",
        "ttl": "Bandung, 17-08-1990",
        "agama": "ISLAM",
        "alamat": "Jl. Melati No. 5",
        "rt": 5,
        "rw": 2,
        "pekerjaan": "Wiraswasta",
        "status_perkawinan": "KAWIN",
        "kewarganegaraan": "Indonesia",
        "no_telepon": "081234567890",
        "status_keluarga": "ANGGOTA",
        "keluarga_id": keluarga_id,
    })
}

#[tokio::test]
async fn test_penduduk_lifecycle_as_admin() {
    let app = spawn_app().await;
    let admin = seed_user(&app.repo, "admin@rt05.id", Role::Admin).await;
    let client = reqwest::Client::new();

    // Register a household card first.
    let card: serde_json::Value = client
        .post(format!("{}/api/admin/keluarga", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "no_kk": "3273011234560001",
            "kepala_keluarga": "Ahmad Suhardi",
            "alamat_kk": "Jl. Melati No. 5"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let keluarga_id = card["id"].as_str().map(|s| Uuid::parse_str(s).unwrap());

    // Create a resident on that card.
    let created = client
        .post(format!("{}/api/penduduk", app.address))
        .header("x-user-id", admin.to_string())
        .json(&penduduk_payload("3273010101010001", "Ahmad Suhardi", keluarga_id))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 200);
    let penduduk: serde_json::Value = created.json().await.unwrap();
    let penduduk_id = penduduk["id"].as_str().unwrap().to_string();

    // Listed, and findable through the free-text search.
    let list: Vec<serde_json::Value> = client
        .get(format!("{}/api/penduduk", app.address))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);

    let hits: Vec<serde_json::Value> = client
        .get(format!("{}/api/penduduk?search=suhardi", app.address))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    let misses: Vec<serde_json::Value> = client
        .get(format!("{}/api/penduduk?search=tidakada", app.address))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(misses.is_empty());

    // Partial update only touches the provided fields.
    let updated: serde_json::Value = client
        .put(format!("{}/api/penduduk/{}", app.address, penduduk_id))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({"pekerjaan": "Pedagang"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["pekerjaan"], "Pedagang");
    assert_eq!(updated["nama"], "Ahmad Suhardi");

    // Admin delete removes the record.
    let deleted = client
        .delete(format!("{}/api/admin/penduduk/{}", app.address, penduduk_id))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let gone = client
        .get(format!("{}/api/penduduk/{}", app.address, penduduk_id))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_warga_cannot_use_admin_endpoints() {
    let app = spawn_app().await;
    let warga = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    let delete = client
        .delete(format!("{}/api/admin/penduduk/{}", app.address, Uuid::new_v4()))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), 403);

    let stats = client
        .get(format!("{}/api/admin/stats", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(stats.status(), 403);

    let aktivitas = client
        .post(format!("{}/api/admin/aktivitas", app.address))
        .header("x-user-id", warga.to_string())
        .json(&serde_json::json!({
            "judul": "Rapat RT", "kategori": "RAPAT", "status": "AKAN_DATANG",
            "deskripsi": "Rapat bulanan", "tanggal": "2026-09-01", "jam": "19:30:00",
            "tempat": "Balai RW", "penyelenggara": "Pengurus RT"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(aktivitas.status(), 403);
}

#[tokio::test]
async fn test_warga_onboarding_profile_then_household() {
    let app = spawn_app().await;
    let warga = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    // No profile yet: no household to show.
    let nothing = client
        .get(format!("{}/api/keluarga/saya", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(nothing.status(), 404);

    // First penduduk created by a resident is their own profile and links the
    // account.
    let profile: serde_json::Value = client
        .post(format!("{}/api/penduduk", app.address))
        .header("x-user-id", warga.to_string())
        .json(&penduduk_payload("3273010101010002", "Ahmad Suhardi", None))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["user_id"].as_str().unwrap(), warga.to_string());

    // Registering the household card makes the caller kepala keluarga.
    let card = client
        .post(format!("{}/api/keluarga", app.address))
        .header("x-user-id", warga.to_string())
        .json(&serde_json::json!({
            "no_kk": "3273011234560002",
            "kepala_keluarga": "Ahmad Suhardi",
            "alamat_kk": "Jl. Melati No. 5"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(card.status(), 200);

    let saya: serde_json::Value = client
        .get(format!("{}/api/keluarga/saya", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saya["jumlah_anggota"], 1);
    assert_eq!(saya["penduduk"][0]["status_keluarga"], "KK");

    // Adding a family member lands on the caller's own card, whatever the
    // payload claims.
    let member = client
        .post(format!("{}/api/penduduk", app.address))
        .header("x-user-id", warga.to_string())
        .json(&penduduk_payload("3273010101010003", "Siti Suhardi", Some(Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(member.status(), 200);

    let saya: serde_json::Value = client
        .get(format!("{}/api/keluarga/saya", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saya["jumlah_anggota"], 2);
    // Head of household is listed first.
    assert_eq!(saya["penduduk"][0]["status_keluarga"], "KK");
}

#[tokio::test]
async fn test_penduduk_update_enforces_ownership() {
    let app = spawn_app().await;
    let owner = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let other = seed_user(&app.repo, "tetangga@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    let profile: serde_json::Value = client
        .post(format!("{}/api/penduduk", app.address))
        .header("x-user-id", owner.to_string())
        .json(&penduduk_payload("3273010101010004", "Ahmad Suhardi", None))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = profile["id"].as_str().unwrap();

    // A different resident may not edit someone else's record.
    let forbidden = client
        .put(format!("{}/api/penduduk/{}", app.address, id))
        .header("x-user-id", other.to_string())
        .json(&serde_json::json!({"no_telepon": "080000000000"}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    // The owner may.
    let ok = client
        .put(format!("{}/api/penduduk/{}", app.address, id))
        .header("x-user-id", owner.to_string())
        .json(&serde_json::json!({"no_telepon": "081111111111"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
}

#[tokio::test]
async fn test_aktivitas_schedule_and_status_filter() {
    let app = spawn_app().await;
    let admin = seed_user(&app.repo, "admin@rt05.id", Role::Admin).await;
    let warga = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/admin/aktivitas", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "judul": "Kerja Bakti", "kategori": "KERJA_BAKTI", "status": "AKAN_DATANG",
            "deskripsi": "Bersih-bersih selokan", "tanggal": "2026-09-06", "jam": "07:00:00",
            "tempat": "RT 05", "penyelenggara": "Pengurus RT"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    client
        .post(format!("{}/api/admin/aktivitas", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "judul": "Rapat Warga", "kategori": "RAPAT", "status": "SELESAI",
            "deskripsi": "Evaluasi iuran", "tanggal": "2026-08-01", "jam": "19:30:00",
            "tempat": "Balai RW", "penyelenggara": "Pengurus RW"
        }))
        .send()
        .await
        .unwrap();

    // Residents read the same schedule.
    let all: Vec<serde_json::Value> = client
        .get(format!("{}/api/aktivitas", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let upcoming: Vec<serde_json::Value> = client
        .get(format!("{}/api/aktivitas?status=AKAN_DATANG", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["judul"], "Kerja Bakti");

    // Advancing the status is the common edit.
    let advanced: serde_json::Value = client
        .put(format!("{}/api/admin/aktivitas/{}", app.address, id))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({"status": "SELESAI"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(advanced["status"], "SELESAI");
    assert_eq!(advanced["judul"], "Kerja Bakti");

    let deleted = client
        .delete(format!("{}/api/admin/aktivitas/{}", app.address, id))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);
}

#[tokio::test]
async fn test_pengumuman_publishing_flow() {
    let app = spawn_app().await;
    let admin = seed_user(&app.repo, "admin@rt05.id", Role::Admin).await;
    let warga = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    let published: serde_json::Value = client
        .post(format!("{}/api/admin/pengumuman", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "judul": "Pemadaman Air", "kategori": "PENTING",
            "deskripsi": "Air mati hari Sabtu pukul 08.00-12.00"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // No linked resident record: the author name falls back to the email.
    assert_eq!(published["nama_penulis"], "admin@rt05.id");
    let id = published["id"].as_str().unwrap().to_string();

    client
        .post(format!("{}/api/admin/pengumuman", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "judul": "Jadwal Posyandu", "kategori": "INFORMASI",
            "deskripsi": "Posyandu balita hari Minggu"
        }))
        .send()
        .await
        .unwrap();

    // Residents read announcements, with kategori filtering.
    let all: Vec<serde_json::Value> = client
        .get(format!("{}/api/pengumuman", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let penting: Vec<serde_json::Value> = client
        .get(format!("{}/api/pengumuman?kategori=PENTING", app.address))
        .header("x-user-id", warga.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(penting.len(), 1);
    assert_eq!(penting[0]["judul"], "Pemadaman Air");

    // Publishing is admin-only.
    let forbidden = client
        .post(format!("{}/api/admin/pengumuman", app.address))
        .header("x-user-id", warga.to_string())
        .json(&serde_json::json!({
            "judul": "Iseng", "kategori": "INFORMASI", "deskripsi": "..."
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    let edited: serde_json::Value = client
        .put(format!("{}/api/admin/pengumuman/{}", app.address, id))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({"kategori": "DARURAT"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edited["kategori"], "DARURAT");

    let deleted = client
        .delete(format!("{}/api/admin/pengumuman/{}", app.address, id))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);
}

#[tokio::test]
async fn test_admin_stats_counts_the_registry() {
    let app = spawn_app().await;
    let admin = seed_user(&app.repo, "admin@rt05.id", Role::Admin).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/admin/keluarga", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "no_kk": "3273011234560003", "kepala_keluarga": "Ahmad", "alamat_kk": "Jl. Melati"
        }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/penduduk", app.address))
        .header("x-user-id", admin.to_string())
        .json(&penduduk_payload("3273010101010005", "Ahmad Suhardi", None))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/admin/aktivitas", app.address))
        .header("x-user-id", admin.to_string())
        .json(&serde_json::json!({
            "judul": "Rapat", "kategori": "RAPAT", "status": "AKAN_DATANG",
            "deskripsi": "-", "tanggal": "2026-09-01", "jam": "19:00:00",
            "tempat": "Balai", "penyelenggara": "RT"
        }))
        .send()
        .await
        .unwrap();

    let stats: serde_json::Value = client
        .get(format!("{}/api/admin/stats", app.address))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_penduduk"], 1);
    assert_eq!(stats["total_keluarga"], 1);
    assert_eq!(stats["aktivitas_akan_datang"], 1);
    assert_eq!(stats["total_pengumuman"], 0);
}

#[tokio::test]
async fn test_presigned_photo_upload() {
    let app = spawn_app().await;
    let warga = seed_user(&app.repo, "ahmad.suhardi@email.com", Role::Warga).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/upload/presigned", app.address))
        .header("x-user-id", warga.to_string())
        .json(&serde_json::json!({
            "filename": "pas_foto.jpg", "file_type": "image/jpeg"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let key = body["resource_key"].as_str().unwrap();
    assert!(key.starts_with("foto/"));
    assert!(key.ends_with(".jpg"));
    assert!(body["upload_url"].as_str().unwrap().contains("signature=fake"));
}
