//! Append-only audit trail

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StaffLogin,
    StaffCreated,
    SuratSubmitted,
    SuratStatusChanged,
    PendudukCreated,
    PendudukUpdated,
    PendudukDeleted,
}

/// Record an audit event. Failures are logged and otherwise ignored so that
/// auditing never blocks the operation being audited.
pub async fn log_audit(
    pool: &PgPool,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    actor_ip: Option<&str>,
    details: Option<serde_json::Value>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (action, entity_type, entity_id, actor_id, actor_ip, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(actor_id)
    .bind(actor_ip)
    .bind(details)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!("Failed to write audit event {:?}: {}", action, e);
    }
}
