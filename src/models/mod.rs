//! Data models for the application

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

/// Kind of letter a resident can request. The SCREAMING_SNAKE_CASE names are
/// the canonical codes used on the wire, in the database and in generated
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "jenis_surat", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JenisSurat {
    SuratKeteranganDomisili,
    SuratKeteranganUsaha,
    SuratKeteranganTidakMampu,
    SuratPengantarKtp,
    SuratPengantarKk,
    SuratKeteranganKelahiran,
    SuratKeteranganKematian,
    SuratKeteranganPindah,
    Lainnya,
}

impl JenisSurat {
    pub const ALL: [JenisSurat; 9] = [
        JenisSurat::SuratKeteranganDomisili,
        JenisSurat::SuratKeteranganUsaha,
        JenisSurat::SuratKeteranganTidakMampu,
        JenisSurat::SuratPengantarKtp,
        JenisSurat::SuratPengantarKk,
        JenisSurat::SuratKeteranganKelahiran,
        JenisSurat::SuratKeteranganKematian,
        JenisSurat::SuratKeteranganPindah,
        JenisSurat::Lainnya,
    ];

    /// Canonical code
    pub fn code(self) -> &'static str {
        match self {
            JenisSurat::SuratKeteranganDomisili => "SURAT_KETERANGAN_DOMISILI",
            JenisSurat::SuratKeteranganUsaha => "SURAT_KETERANGAN_USAHA",
            JenisSurat::SuratKeteranganTidakMampu => "SURAT_KETERANGAN_TIDAK_MAMPU",
            JenisSurat::SuratPengantarKtp => "SURAT_PENGANTAR_KTP",
            JenisSurat::SuratPengantarKk => "SURAT_PENGANTAR_KK",
            JenisSurat::SuratKeteranganKelahiran => "SURAT_KETERANGAN_KELAHIRAN",
            JenisSurat::SuratKeteranganKematian => "SURAT_KETERANGAN_KEMATIAN",
            JenisSurat::SuratKeteranganPindah => "SURAT_KETERANGAN_PINDAH",
            JenisSurat::Lainnya => "LAINNYA",
        }
    }
}

impl fmt::Display for JenisSurat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown jenis_surat '{0}'")]
pub struct UnknownJenisSurat(pub String);

impl FromStr for JenisSurat {
    type Err = UnknownJenisSurat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JenisSurat::ALL
            .into_iter()
            .find(|jenis| jenis.code() == s)
            .ok_or_else(|| UnknownJenisSurat(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "surat_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuratStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Completed,
}

impl SuratStatus {
    pub const ALL: [SuratStatus; 5] = [
        SuratStatus::Pending,
        SuratStatus::Processing,
        SuratStatus::Approved,
        SuratStatus::Rejected,
        SuratStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SuratStatus::Pending => "pending",
            SuratStatus::Processing => "processing",
            SuratStatus::Approved => "approved",
            SuratStatus::Rejected => "rejected",
            SuratStatus::Completed => "completed",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: SuratStatus) -> bool {
        use SuratStatus::*;

        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Processing, Approved)
                | (Processing, Rejected)
                | (Approved, Completed)
        )
    }
}

impl fmt::Display for SuratStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "staff_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    PerangkatDesa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "jenis_kelamin", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JenisKelamin {
    LakiLaki,
    Perempuan,
}

// =============================================================================
// Surat
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SuratRequest {
    pub id: Uuid,
    pub jenis_surat: JenisSurat,
    pub pemohon_id: Uuid,
    pub keperluan: String,
    pub status: SuratStatus,
    pub tracking_code: String,
    pub nomor_surat: Option<String>,
    pub tanggal_pengajuan: DateTime<Utc>,
    pub tanggal_disetujui: Option<DateTime<Utc>>,
    pub tanggal_selesai: Option<DateTime<Utc>>,
    pub keterangan: Option<String>,
    pub processed_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub template_data: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a letter request. `jenis_surat` stays a plain string so that an
/// unknown code is reported by the workflow instead of the JSON extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSurat {
    pub jenis_surat: String,
    pub pemohon_id: Uuid,
    pub keperluan: String,
    pub template_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuratFilter {
    pub status: Option<SuratStatus>,
    pub jenis_surat: Option<JenisSurat>,
    pub pemohon_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectSurat {
    #[serde(default)]
    pub keterangan: String,
}

/// Public view returned by the tracking endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SuratTrackingResponse {
    pub tracking_code: String,
    pub jenis_surat: JenisSurat,
    pub status: SuratStatus,
    pub nomor_surat: Option<String>,
    pub tanggal_pengajuan: DateTime<Utc>,
    pub tanggal_selesai: Option<DateTime<Utc>>,
    pub keterangan: Option<String>,
}

impl From<SuratRequest> for SuratTrackingResponse {
    fn from(surat: SuratRequest) -> Self {
        Self {
            tracking_code: surat.tracking_code,
            jenis_surat: surat.jenis_surat,
            status: surat.status,
            nomor_surat: surat.nomor_surat,
            tanggal_pengajuan: surat.tanggal_pengajuan,
            tanggal_selesai: surat.tanggal_selesai,
            keterangan: surat.keterangan,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SuratStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_jenis: Vec<JenisCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StatusCount {
    pub status: SuratStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct JenisCount {
    pub jenis_surat: JenisSurat,
    pub count: i64,
}

// =============================================================================
// Penduduk
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Penduduk {
    pub id: Uuid,
    pub nik: String,
    pub nama: String,
    pub tempat_lahir: String,
    pub tanggal_lahir: NaiveDate,
    pub jenis_kelamin: JenisKelamin,
    pub alamat: String,
    pub rt: String,
    pub rw: String,
    pub agama: Option<String>,
    pub pekerjaan: Option<String>,
    pub status_perkawinan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePenduduk {
    pub nik: String,
    #[validate(length(min = 1, max = 255))]
    pub nama: String,
    #[validate(length(min = 1, max = 255))]
    pub tempat_lahir: String,
    pub tanggal_lahir: NaiveDate,
    pub jenis_kelamin: JenisKelamin,
    #[validate(length(min = 1, max = 1000))]
    pub alamat: String,
    pub rt: String,
    pub rw: String,
    #[validate(length(max = 100))]
    pub agama: Option<String>,
    #[validate(length(max = 255))]
    pub pekerjaan: Option<String>,
    #[validate(length(max = 100))]
    pub status_perkawinan: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePenduduk {
    #[validate(length(min = 1, max = 255))]
    pub nama: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub tempat_lahir: Option<String>,
    pub tanggal_lahir: Option<NaiveDate>,
    pub jenis_kelamin: Option<JenisKelamin>,
    #[validate(length(min = 1, max = 1000))]
    pub alamat: Option<String>,
    pub rt: Option<String>,
    pub rw: Option<String>,
    #[validate(length(max = 100))]
    pub agama: Option<String>,
    #[validate(length(max = 255))]
    pub pekerjaan: Option<String>,
    #[validate(length(max = 100))]
    pub status_perkawinan: Option<String>,
}

// =============================================================================
// Staff User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct StaffUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub nama: String,
    pub role: StaffRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffUserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub nama: String,
    pub role: StaffRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<StaffUser> for StaffUserResponse {
    fn from(user: StaffUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            nama: user.nama,
            role: user.role,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: StaffUserResponse,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStaffUser {
    #[validate(length(min = 3, max = 100))]
    pub username: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, max = 1024))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub nama: String,
    pub role: StaffRole,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total as f64 / per_page as f64).ceil() as i64;
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub const MAX_PAGE: i64 = 100_000;

    /// Page number (1-based) and page size, clamped to sane bounds
    pub fn resolve(self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, Self::MAX_PAGE);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page)
    }
}

/// Row offset for a 1-based page; never negative, never overflows
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(per_page.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jenis_surat_round_trips_through_code() {
        for jenis in JenisSurat::ALL {
            assert_eq!(jenis.code().parse::<JenisSurat>(), Ok(jenis));
        }
    }

    #[test]
    fn test_jenis_surat_rejects_unknown_code() {
        assert!("SURAT_IZIN_KERAMAIAN".parse::<JenisSurat>().is_err());
        assert!("surat_keterangan_domisili".parse::<JenisSurat>().is_err());
        assert!("".parse::<JenisSurat>().is_err());
    }

    #[test]
    fn test_jenis_surat_serde_uses_canonical_code() {
        let json = serde_json::to_string(&JenisSurat::SuratPengantarKtp).unwrap();
        assert_eq!(json, "\"SURAT_PENGANTAR_KTP\"");
    }

    #[test]
    fn test_allowed_transitions() {
        use SuratStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Processing.can_transition_to(Approved));
        assert!(Processing.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));
    }

    #[test]
    fn test_forbidden_transitions() {
        use SuratStatus::*;

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Rejected));
        for next in SuratStatus::ALL {
            assert!(!Rejected.can_transition_to(next));
            assert!(!Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_page_query_clamps() {
        let query = PageQuery {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(query.resolve(), (1, 100));

        let query = PageQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(query.resolve(), (1, 20));

        let query = PageQuery {
            page: Some(i64::MAX),
            per_page: Some(100),
        };
        assert_eq!(query.resolve(), (PageQuery::MAX_PAGE, 100));
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(i64::MIN, 20), 0);
        assert_eq!(page_offset(i64::MAX, 100), i64::MAX);
    }

    #[test]
    fn test_paginated_total_pages() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}
