//! Staff authentication handlers

use crate::config::{BootstrapAdmin, MAX_JWT_EXPIRY_HOURS};
use crate::db::{log_audit, AuditAction};
use crate::models::*;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::net::SocketAddr;
use uuid::Uuid;

use super::AppState;

/// Rate limit: max attempts per IP per hour
pub const MAX_LOGIN_ATTEMPTS: i64 = 10;

/// Rate limit for public letter requests
pub const MAX_SUBMISSION_ATTEMPTS: i64 = 20;

// =============================================================================
// Access Tokens
// =============================================================================

/// Claims carried by a staff access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: StaffRole,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification keys plus the token lifetime
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::hours(expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS)),
        }
    }

    /// Sign a token for `user`, returning it with its expiry time
    pub fn issue(
        &self,
        user: &StaffUser,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
        let expires_at = now + self.lifetime;
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

// =============================================================================
// Login Endpoint
// =============================================================================

/// Staff login
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> impl IntoResponse {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let client_ip = get_client_ip(&headers, peer, &state.trusted_proxies);

    // Check rate limit
    if !check_rate_limit(&state.pool, &client_ip, "login", MAX_LOGIN_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<LoginResponse>::error(
                "Too many login attempts. Please try again later.",
            )),
        );
    }

    // Record attempt
    record_attempt(&state.pool, &client_ip, "login").await;

    // Find user
    let user = sqlx::query_as::<_, StaffUser>(
        "SELECT * FROM staff_users WHERE username = $1 AND is_active = true",
    )
    .bind(&input.username)
    .fetch_optional(&state.pool)
    .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) => {
            // Don't reveal whether username exists
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Invalid username or password")),
            );
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    // Verify password
    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for user {}", user.username);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid username or password")),
        );
    }

    let (token, expires_at) = match state.jwt.issue(&user, Utc::now()) {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!("Failed to sign access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    // Update last login
    if let Err(e) = sqlx::query("UPDATE staff_users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await
    {
        tracing::warn!("Failed to update last login for {}: {}", user.username, e);
    }

    log_audit(
        &state.pool,
        AuditAction::StaffLogin,
        "staff_user",
        Some(user.id),
        Some(user.id),
        Some(&client_ip),
        None,
    )
    .await;

    tracing::info!("Staff {} logged in", user.username);

    (
        StatusCode::OK,
        Json(ApiResponse::success(LoginResponse {
            token,
            expires_at,
            user: StaffUserResponse::from(user),
        })),
    )
}

/// Get current staff user
pub async fn me(Extension(staff): Extension<StaffUser>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(StaffUserResponse::from(staff))),
    )
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Create the configured admin account unless the username is already taken
pub async fn ensure_bootstrap_admin(
    pool: &PgPool,
    admin: &BootstrapAdmin,
) -> Result<(), sqlx::Error> {
    let password_hash =
        hash_password(&admin.password).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let created = sqlx::query(
        r#"
        INSERT INTO staff_users (username, email, password_hash, nama, role)
        VALUES ($1, $2, $3, $1, 'admin')
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(&admin.username)
    .bind(&admin.email)
    .bind(password_hash)
    .execute(pool)
    .await?
    .rows_affected();

    if created > 0 {
        tracing::info!("Created bootstrap admin account '{}'", admin.username);
    }
    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Client address for rate limiting and auditing. Forwarding headers are
/// only honoured when the direct peer is one of the trusted proxies.
pub fn get_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[String],
) -> String {
    let peer_ip = match peer {
        Some(addr) => addr.ip().to_string(),
        None => return "unknown".to_string(),
    };

    if !trusted_proxies
        .iter()
        .any(|prefix| peer_ip.starts_with(prefix.as_str()))
    {
        return peer_ip;
    }

    // Check X-Forwarded-For first (for reverse proxy setups)
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first_ip.to_string();
    }

    // Check X-Real-IP
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }

    peer_ip
}

pub async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str, max_attempts: i64) -> bool {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await;

    match count {
        Ok(count) => count < max_attempts,
        Err(e) => {
            tracing::warn!("Rate limit check failed for {}: {}", endpoint, e);
            true
        }
    }
}

pub async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    if let Err(e) =
        sqlx::query("INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)")
            .bind(ip)
            .bind(endpoint)
            .execute(pool)
            .await
    {
        tracing::warn!("Failed to record rate limit attempt for {}: {}", endpoint, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::errors::ErrorKind;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn staff(role: StaffRole) -> StaffUser {
        StaffUser {
            id: Uuid::new_v4(),
            username: "kaur.umum".to_string(),
            email: "umum@desa.example".to_string(),
            password_hash: String::new(),
            nama: "Kaur Umum".to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let keys = JwtKeys::new(SECRET, 8);
        let user = staff(StaffRole::Admin);
        let now = Utc::now();

        let (token, expires_at) = keys.issue(&user, now).unwrap();
        assert_eq!(expires_at, now + Duration::hours(8));

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "kaur.umum");
        assert_eq!(claims.role, StaffRole::Admin);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_token_lifetime_is_bounded() {
        let now = Utc::now();
        let user = staff(StaffRole::PerangkatDesa);

        let (_, expires_at) = JwtKeys::new(SECRET, i64::MAX).issue(&user, now).unwrap();
        assert_eq!(expires_at, now + Duration::hours(MAX_JWT_EXPIRY_HOURS));

        let (_, expires_at) = JwtKeys::new(SECRET, 0).issue(&user, now).unwrap();
        assert_eq!(expires_at, now + Duration::hours(1));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = JwtKeys::new(SECRET, 1);
        let (token, _) = keys
            .issue(&staff(StaffRole::PerangkatDesa), Utc::now() - Duration::hours(3))
            .unwrap();

        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = JwtKeys::new("ffffffffffffffffffffffffffffffff", 8);
        let (token, _) = other.issue(&staff(StaffRole::Admin), Utc::now()).unwrap();

        let err = JwtKeys::new(SECRET, 8).verify(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("kata-sandi-rahasia").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"kata-sandi-rahasia", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"salah", &parsed).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(extract_bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_client_ip_ignores_forwarding_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        let peer: SocketAddr = "203.0.113.9:5000".parse().unwrap();

        assert_eq!(get_client_ip(&headers, Some(peer), &[]), "203.0.113.9");
        assert_eq!(
            get_client_ip(&headers, Some(peer), &["10.0.0.".to_string()]),
            "203.0.113.9"
        );
    }

    #[test]
    fn test_client_ip_uses_forwarding_from_trusted_proxy() {
        let trusted = vec!["10.0.0.".to_string()];
        let peer: SocketAddr = "10.0.0.7:443".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.2, 10.0.0.7"));
        assert_eq!(get_client_ip(&headers, Some(peer), &trusted), "198.51.100.2");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.3"));
        assert_eq!(get_client_ip(&headers, Some(peer), &trusted), "198.51.100.3");

        assert_eq!(get_client_ip(&HeaderMap::new(), Some(peer), &trusted), "10.0.0.7");
    }

    #[test]
    fn test_client_ip_without_peer() {
        assert_eq!(get_client_ip(&HeaderMap::new(), None, &[]), "unknown");
    }
}
