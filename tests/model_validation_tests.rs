use chrono::{NaiveDate, NaiveTime};
use sipakerte::models::{
    Aktivitas, DashboardStats, Penduduk, Role, UpdateAktivitasRequest, UpdatePendudukRequest,
};

// --- Role label contract ---

#[test]
fn test_role_wire_labels_round_trip() {
    assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
    assert_eq!("WARGA".parse::<Role>(), Ok(Role::Warga));
    assert_eq!(Role::Admin.to_string(), "ADMIN");
    assert_eq!(Role::Warga.to_string(), "WARGA");
}

#[test]
fn test_role_rejects_unknown_labels() {
    // Parsing is the only way a label becomes a Role; anything unknown fails
    // here instead of floating through the system as a live role.
    assert!("warga".parse::<Role>().is_err());
    assert!("RT".parse::<Role>().is_err());
    assert!("".parse::<Role>().is_err());
    assert!("SUPERADMIN".parse::<Role>().is_err());
}

#[test]
fn test_role_serde_uses_uppercase_labels() {
    assert_eq!(serde_json::to_string(&Role::Warga).unwrap(), "\"WARGA\"");
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    let parsed: Role = serde_json::from_str("\"ADMIN\"").unwrap();
    assert_eq!(parsed, Role::Admin);
}

#[test]
fn test_role_home_paths() {
    assert_eq!(Role::Warga.home_path(), "/user/dashboard");
    assert_eq!(Role::Admin.home_path(), "/admin/dashboard");
}

// --- Wire field names ---

#[test]
fn test_penduduk_serializes_the_portal_field_names() {
    let json = serde_json::to_value(Penduduk::default()).unwrap();
    let obj = json.as_object().unwrap();
    for field in [
        "nik",
        "nama",
        "jenis_kelamin",
        "ttl",
        "agama",
        "alamat",
        "rt",
        "rw",
        "pekerjaan",
        "status_perkawinan",
        "kewarganegaraan",
        "no_telepon",
        "status_keluarga",
        "foto",
    ] {
        assert!(obj.contains_key(field), "missing field {field}");
    }
}

#[test]
fn test_dashboard_stats_field_names() {
    let json = serde_json::to_value(DashboardStats::default()).unwrap();
    let obj = json.as_object().unwrap();
    for field in [
        "total_penduduk",
        "total_keluarga",
        "aktivitas_akan_datang",
        "total_pengumuman",
    ] {
        assert!(obj.contains_key(field), "missing field {field}");
    }
}

// --- Partial update payloads ---

#[test]
fn test_empty_update_serializes_to_empty_object() {
    // skip_serializing_if keeps untouched fields out of the payload entirely.
    let empty = UpdatePendudukRequest::default();
    assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");

    let empty = UpdateAktivitasRequest::default();
    assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");
}

#[test]
fn test_partial_update_deserializes_missing_fields_as_none() {
    let req: UpdatePendudukRequest =
        serde_json::from_str(r#"{"pekerjaan": "Pedagang"}"#).unwrap();
    assert_eq!(req.pekerjaan.as_deref(), Some("Pedagang"));
    assert!(req.nama.is_none());
    assert!(req.foto_key.is_none());
}

// --- Date & time wire formats ---

#[test]
fn test_aktivitas_date_and_time_formats() {
    let mut aktivitas = Aktivitas::default();
    aktivitas.tanggal = NaiveDate::from_ymd_opt(2026, 9, 6).unwrap();
    aktivitas.jam = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

    let json = serde_json::to_value(&aktivitas).unwrap();
    // The portal sends/expects plain ISO date and time strings.
    assert_eq!(json["tanggal"], "2026-09-06");
    assert_eq!(json["jam"], "07:00:00");

    let parsed: Aktivitas = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.tanggal, aktivitas.tanggal);
    assert_eq!(parsed.jam, aktivitas.jam);
}
