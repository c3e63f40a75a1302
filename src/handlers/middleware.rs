//! Middleware for authentication and security headers

use crate::handlers::auth::extract_bearer_token;
use crate::handlers::AppState;
use crate::models::{ApiResponse, StaffRole, StaffUser};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

/// Authenticated staff user, available to handlers via `Extension<StaffUser>`
pub async fn require_staff(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer_token(request.headers()) {
        Some(t) => t,
        None => return reject(StatusCode::UNAUTHORIZED, "Not authenticated"),
    };

    let claims = match state.jwt.verify(token) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Rejected access token: {}", e);
            return reject(StatusCode::UNAUTHORIZED, "Token expired or invalid");
        }
    };

    // Accounts can be deactivated while a token is still valid
    let user = sqlx::query_as::<_, StaffUser>(
        "SELECT * FROM staff_users WHERE id = $1 AND is_active = true",
    )
    .bind(claims.sub)
    .fetch_optional(&state.pool)
    .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) => return reject(StatusCode::UNAUTHORIZED, "User not found or inactive"),
        Err(e) => {
            tracing::error!("Database error fetching staff user: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error");
        }
    };

    request.extensions_mut().insert(user);

    next.run(request).await
}

/// Admin-only routes. Must run after [`require_staff`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let staff = request
        .extensions()
        .get::<StaffUser>()
        .map(|user| (user.role, user.username.clone()));

    match staff {
        Some((StaffRole::Admin, _)) => next.run(request).await,
        Some((_, username)) => {
            tracing::warn!("Staff {} denied access to {}", username, request.uri().path());
            reject(StatusCode::FORBIDDEN, "Admin role required")
        }
        None => reject(StatusCode::UNAUTHORIZED, "Not authenticated"),
    }
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
