//! Staff account management (admin only)

use crate::db::{log_audit, AuditAction};
use crate::models::*;
use crate::validation::validate_create_staff;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use super::auth::hash_password;
use super::AppState;

/// List staff accounts
pub async fn list_staff(
    State(state): State<AppState>,
    Extension(admin): Extension<StaffUser>,
    Query(page): Query<PageQuery>,
) -> impl IntoResponse {
    let (page, per_page) = page.resolve();
    let offset = page_offset(page, per_page);

    let users = sqlx::query_as::<_, StaffUser>(
        "SELECT * FROM staff_users ORDER BY username LIMIT $1 OFFSET $2",
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(&state.pool)
    .await;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM staff_users")
        .fetch_one(&state.pool)
        .await;

    match (users, total) {
        (Ok(users), Ok(total)) => {
            tracing::info!(
                "Admin {} listed staff (page {}, {} results)",
                admin.username,
                page,
                users.len()
            );
            let items: Vec<StaffUserResponse> =
                users.into_iter().map(StaffUserResponse::from).collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(PaginatedResponse::new(
                    items, total, page, per_page,
                ))),
            )
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to list staff users: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to list staff")),
            )
        }
    }
}

/// Create a staff account
pub async fn create_staff(
    State(state): State<AppState>,
    Extension(admin): Extension<StaffUser>,
    Json(input): Json<CreateStaffUser>,
) -> impl IntoResponse {
    if let Err(e) = validate_create_staff(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<StaffUserResponse>::error(e.to_string())),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create staff user")),
            );
        }
    };

    let result = sqlx::query_as::<_, StaffUser>(
        r#"
        INSERT INTO staff_users (username, email, password_hash, nama, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(password_hash)
    .bind(input.nama.trim())
    .bind(input.role)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(user) => {
            log_audit(
                &state.pool,
                AuditAction::StaffCreated,
                "staff_user",
                Some(user.id),
                Some(admin.id),
                None,
                Some(json!({ "username": user.username, "role": user.role })),
            )
            .await;

            tracing::info!("Admin {} created staff user {}", admin.username, user.username);
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(StaffUserResponse::from(user))),
            )
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Username already exists")),
        ),
        Err(e) => {
            tracing::error!("Failed to create staff user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create staff user")),
            )
        }
    }
}
