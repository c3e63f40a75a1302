//! Database access

mod audit;
mod pool;
mod surat_store;

pub use audit::{log_audit, AuditAction};
pub use pool::{create_pool, run_migrations};
pub use surat_store::PgSuratRepository;
