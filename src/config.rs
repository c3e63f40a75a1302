//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Signing secret used when `JWT_SECRET` is unset outside production
const DEVELOPMENT_JWT_SECRET: &str = "layanan-desa-development-secret";

/// Longest accepted access token lifetime (30 days)
pub const MAX_JWT_EXPIRY_HOURS: i64 = 24 * 30;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// HMAC secret for staff access tokens
    pub jwt_secret: String,
    /// Access token lifetime in hours
    pub jwt_expiry_hours: i64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Trusted proxy IP prefixes (e.g., ["10.0.0.", "172.16."])
    /// Only trust X-Forwarded-For headers from these IPs
    pub trusted_proxies: Vec<String>,
    /// Admin account created on startup when no account with that username exists
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment =
            Environment::parse(&env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()));

        // Build DATABASE_URL from various env var formats:
        // 1. DATABASE_URL (standard)
        // 2. DATABASE_SERVER_FULL (platform alias)
        // 3. Individual components: DATABASE_SERVER_HOST, DATABASE_SERVER_PORT, DATABASE_SERVER_USER, DATABASE_PASSWORD, DATABASE_DB
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("DATABASE_SERVER_FULL"))
            .or_else(|_| {
                let host = env::var("DATABASE_SERVER_HOST")?;
                let port = env::var("DATABASE_SERVER_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_SERVER_USER")?;
                let password = env::var("DATABASE_PASSWORD")?;
                let db = env::var("DATABASE_DB")?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL, DATABASE_SERVER_FULL, or DATABASE_SERVER_HOST + DATABASE_SERVER_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if secret.len() >= 32 => secret,
            Ok(_) => {
                return Err(ConfigError::Invalid(
                    "JWT_SECRET must be at least 32 characters".to_string(),
                ))
            }
            Err(_) if environment == Environment::Production => {
                return Err(ConfigError::Missing(
                    "JWT_SECRET is required in production".to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!("JWT_SECRET not set, using the insecure development secret");
                DEVELOPMENT_JWT_SECRET.to_string()
            }
        };

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT '{}' is not a valid port", p)))?,
            Err(_) => 8080,
        };

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(BootstrapAdmin {
                email: env::var("BOOTSTRAP_ADMIN_EMAIL")
                    .unwrap_or_else(|_| format!("{}@localhost", username)),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_url,
            jwt_secret,
            jwt_expiry_hours: parse_expiry_hours(env::var("JWT_EXPIRY_HOURS").ok().as_deref())?,
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB default
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|_| vec!["http://localhost:8080".to_string()]),
            environment,
            // Examples: "10.0.0.", "172.16.", "127.0.0.1"
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            bootstrap_admin,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `JWT_EXPIRY_HOURS`: 8 when unset, otherwise 1 to 720 hours
fn parse_expiry_hours(value: Option<&str>) -> Result<i64, ConfigError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(8);
    };
    match raw.parse::<i64>() {
        Ok(hours) if (1..=MAX_JWT_EXPIRY_HOURS).contains(&hours) => Ok(hours),
        _ => Err(ConfigError::Invalid(format!(
            "JWT_EXPIRY_HOURS '{}' must be between 1 and {}",
            raw, MAX_JWT_EXPIRY_HOURS
        ))),
    }
}

/// Comma separated list, blanks dropped
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
