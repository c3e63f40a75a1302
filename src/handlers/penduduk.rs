//! Resident (penduduk) registry handlers

use crate::db::{log_audit, AuditAction};
use crate::models::*;
use crate::validation::{validate_create_penduduk, validate_update_penduduk};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct PendudukSearch {
    /// Matches NIK prefix or part of the name
    pub q: Option<String>,
}

/// Map constraint violations on the penduduk table to client errors
fn write_error_response<T>(e: sqlx::Error, action: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error("A resident with this NIK already exists")),
            );
        }
        if db_err.is_foreign_key_violation() {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error(
                    "Resident still has letter requests and cannot be deleted",
                )),
            );
        }
    }

    tracing::error!("Failed to {} penduduk: {}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(format!("Failed to {} resident", action))),
    )
}

/// Make user text literal inside a LIKE pattern
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn not_found<T>() -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Resident not found")),
    )
}

/// List residents, optionally filtered by `q`
pub async fn list_penduduk(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<PendudukSearch>,
) -> impl IntoResponse {
    let (page, per_page) = page.resolve();
    let offset = page_offset(page, per_page);

    let search = search
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let name_pattern = search.as_deref().map(|q| format!("%{}%", escape_like(q)));
    let nik_pattern = search.as_deref().map(|q| format!("{}%", escape_like(q)));

    let items = sqlx::query_as::<_, Penduduk>(
        r#"
        SELECT * FROM penduduk
        WHERE ($1::text IS NULL OR nama ILIKE $1 ESCAPE '\' OR nik LIKE $2 ESCAPE '\')
        ORDER BY nama
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(&name_pattern)
    .bind(&nik_pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(&state.pool)
    .await;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM penduduk
        WHERE ($1::text IS NULL OR nama ILIKE $1 ESCAPE '\' OR nik LIKE $2 ESCAPE '\')
        "#,
    )
    .bind(&name_pattern)
    .bind(&nik_pattern)
    .fetch_one(&state.pool)
    .await;

    match (items, total) {
        (Ok(items), Ok(total)) => (
            StatusCode::OK,
            Json(ApiResponse::success(PaginatedResponse::new(
                items, total, page, per_page,
            ))),
        ),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to list penduduk: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to list residents")),
            )
        }
    }
}

pub async fn get_penduduk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match sqlx::query_as::<_, Penduduk>("SELECT * FROM penduduk WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(p)) => (StatusCode::OK, Json(ApiResponse::success(p))),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!("Failed to fetch penduduk {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to fetch resident")),
            )
        }
    }
}

/// Register a resident
pub async fn create_penduduk(
    State(state): State<AppState>,
    Extension(staff): Extension<StaffUser>,
    Json(input): Json<CreatePenduduk>,
) -> impl IntoResponse {
    if let Err(e) = validate_create_penduduk(&input, Utc::now().date_naive()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Penduduk>::error(e.to_string())),
        );
    }

    let result = sqlx::query_as::<_, Penduduk>(
        r#"
        INSERT INTO penduduk (
            nik, nama, tempat_lahir, tanggal_lahir, jenis_kelamin,
            alamat, rt, rw, agama, pekerjaan, status_perkawinan
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(&input.nik)
    .bind(input.nama.trim())
    .bind(input.tempat_lahir.trim())
    .bind(input.tanggal_lahir)
    .bind(input.jenis_kelamin)
    .bind(input.alamat.trim())
    .bind(&input.rt)
    .bind(&input.rw)
    .bind(&input.agama)
    .bind(&input.pekerjaan)
    .bind(&input.status_perkawinan)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(penduduk) => {
            log_audit(
                &state.pool,
                AuditAction::PendudukCreated,
                "penduduk",
                Some(penduduk.id),
                Some(staff.id),
                None,
                None,
            )
            .await;

            tracing::info!("Staff {} registered penduduk {}", staff.username, penduduk.id);
            (StatusCode::CREATED, Json(ApiResponse::success(penduduk)))
        }
        Err(e) => write_error_response(e, "create"),
    }
}

/// Partial update; NIK is immutable
pub async fn update_penduduk(
    State(state): State<AppState>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePenduduk>,
) -> impl IntoResponse {
    if let Err(e) = validate_update_penduduk(&input, Utc::now().date_naive()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Penduduk>::error(e.to_string())),
        );
    }

    let result = sqlx::query_as::<_, Penduduk>(
        r#"
        UPDATE penduduk SET
            nama = COALESCE($2, nama),
            tempat_lahir = COALESCE($3, tempat_lahir),
            tanggal_lahir = COALESCE($4, tanggal_lahir),
            jenis_kelamin = COALESCE($5, jenis_kelamin),
            alamat = COALESCE($6, alamat),
            rt = COALESCE($7, rt),
            rw = COALESCE($8, rw),
            agama = COALESCE($9, agama),
            pekerjaan = COALESCE($10, pekerjaan),
            status_perkawinan = COALESCE($11, status_perkawinan),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.nama.as_deref().map(str::trim))
    .bind(input.tempat_lahir.as_deref().map(str::trim))
    .bind(input.tanggal_lahir)
    .bind(input.jenis_kelamin)
    .bind(input.alamat.as_deref().map(str::trim))
    .bind(&input.rt)
    .bind(&input.rw)
    .bind(&input.agama)
    .bind(&input.pekerjaan)
    .bind(&input.status_perkawinan)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(penduduk)) => {
            log_audit(
                &state.pool,
                AuditAction::PendudukUpdated,
                "penduduk",
                Some(penduduk.id),
                Some(staff.id),
                None,
                serde_json::to_value(&input).ok(),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(penduduk)))
        }
        Ok(None) => not_found(),
        Err(e) => write_error_response(e, "update"),
    }
}

/// Admin only. Residents referenced by a letter request are kept.
pub async fn delete_penduduk(
    State(state): State<AppState>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_scalar::<_, String>("DELETE FROM penduduk WHERE id = $1 RETURNING nik")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    match result {
        Ok(Some(nik)) => {
            log_audit(
                &state.pool,
                AuditAction::PendudukDeleted,
                "penduduk",
                Some(id),
                Some(staff.id),
                None,
                Some(json!({ "nik": nik })),
            )
            .await;

            tracing::info!("Admin {} deleted penduduk {}", staff.username, id);
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(None) => not_found(),
        Err(e) => write_error_response(e, "delete"),
    }
}
