//! Letter request (surat) lifecycle
//!
//! [`SuratWorkflow`] owns the state machine of a single request: submission,
//! tracking-code generation, the staff transitions and official-number
//! assignment at approval. Persistence, time and randomness are injected
//! through the traits defined here so the workflow can run against Postgres
//! in production and against [`memory::MemorySuratRepository`] in tests.

pub mod identifiers;
#[cfg(test)]
pub mod memory;
pub mod workflow;

pub use identifiers::{RandomIdentifierGenerator, SystemClock};
pub use workflow::SuratWorkflow;

use crate::models::{JenisSurat, SuratFilter, SuratRequest, SuratStats, SuratStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Unique constraint on `surat_requests.tracking_code`
pub const TRACKING_CODE_CONSTRAINT: &str = "surat_requests_tracking_code_key";

/// Unique constraint on `(surat_requests.jenis_surat, surat_requests.nomor_surat)`
pub const NOMOR_SURAT_CONSTRAINT: &str = "surat_requests_jenis_nomor_key";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("Transaction already finished")]
    TransactionClosed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum SuratError {
    #[error("Invalid {field}: {message}")]
    InvalidArgument { field: &'static str, message: String },

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Cannot change status from {current} to {requested}")]
    InvalidTransition {
        current: SuratStatus,
        requested: SuratStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for SuratError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation { constraint } => {
                SuratError::Conflict(format!("unique constraint '{}' violated", constraint))
            }
            other => SuratError::Repository(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SuratError>;

// =============================================================================
// Collaborators
// =============================================================================

/// Storage for letter requests.
///
/// Reads and inserts run directly against the store. Status transitions go
/// through [`SuratRepository::begin`] so that the load, the checks and the
/// write happen in one isolated unit of work.
#[async_trait]
pub trait SuratRepository: Send + Sync {
    async fn begin(&self) -> std::result::Result<Box<dyn SuratTransaction>, RepositoryError>;

    /// Insert a new request. A duplicate tracking code is reported as
    /// [`RepositoryError::UniqueViolation`] with [`TRACKING_CODE_CONSTRAINT`].
    async fn insert(&self, record: &SuratRequest)
        -> std::result::Result<SuratRequest, RepositoryError>;

    async fn find_by_id(&self, id: Uuid)
        -> std::result::Result<Option<SuratRequest>, RepositoryError>;

    async fn find_by_tracking_code(
        &self,
        code: &str,
    ) -> std::result::Result<Option<SuratRequest>, RepositoryError>;

    async fn resident_exists(&self, pemohon_id: Uuid) -> std::result::Result<bool, RepositoryError>;

    /// Newest submissions first
    async fn list(
        &self,
        filter: &SuratFilter,
        limit: i64,
        offset: i64,
    ) -> std::result::Result<(Vec<SuratRequest>, i64), RepositoryError>;

    async fn stats(&self) -> std::result::Result<SuratStats, RepositoryError>;
}

/// One unit of work. Dropping it without [`SuratTransaction::commit`] discards
/// every write made through it.
#[async_trait]
pub trait SuratTransaction: Send {
    /// Load a request and lock it until the transaction ends
    async fn find_by_id(&mut self, id: Uuid)
        -> std::result::Result<Option<SuratRequest>, RepositoryError>;

    /// Number of requests of `jenis` that were given an official number
    /// during `year`. Implementations must keep concurrent callers for the
    /// same `(jenis, year)` out until this transaction ends, otherwise two
    /// approvals could derive the same sequence.
    async fn count_approved_by_type_and_year(
        &mut self,
        jenis: JenisSurat,
        year: i32,
    ) -> std::result::Result<i64, RepositoryError>;

    async fn save(&mut self, record: &SuratRequest)
        -> std::result::Result<SuratRequest, RepositoryError>;

    async fn commit(&mut self) -> std::result::Result<(), RepositoryError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdentifierGenerator: Send + Sync {
    /// `len` random characters from `0-9a-z` (case is not significant)
    fn random_base36(&self, len: usize) -> String;
}
