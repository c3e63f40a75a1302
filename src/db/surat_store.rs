//! Postgres-backed surat repository

use crate::models::{JenisCount, JenisSurat, StatusCount, SuratFilter, SuratRequest, SuratStats};
use crate::surat::{RepositoryError, SuratRepository, SuratTransaction};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct PgSuratRepository {
    pool: PgPool,
}

impl PgSuratRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Translate unique violations into [`RepositoryError::UniqueViolation`] so
/// callers can tell which identifier collided
fn map_db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl SuratRepository for PgSuratRepository {
    async fn begin(&self) -> Result<Box<dyn SuratTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSuratTransaction { tx: Some(tx) }))
    }

    async fn insert(&self, record: &SuratRequest) -> Result<SuratRequest, RepositoryError> {
        sqlx::query_as::<_, SuratRequest>(
            r#"
            INSERT INTO surat_requests (
                id, jenis_surat, pemohon_id, keperluan, status, tracking_code,
                nomor_surat, tanggal_pengajuan, tanggal_disetujui, tanggal_selesai,
                keterangan, processed_by, approved_by, template_data, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.jenis_surat)
        .bind(record.pemohon_id)
        .bind(&record.keperluan)
        .bind(record.status)
        .bind(&record.tracking_code)
        .bind(&record.nomor_surat)
        .bind(record.tanggal_pengajuan)
        .bind(record.tanggal_disetujui)
        .bind(record.tanggal_selesai)
        .bind(&record.keterangan)
        .bind(record.processed_by)
        .bind(record.approved_by)
        .bind(&record.template_data)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SuratRequest>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, SuratRequest>("SELECT * FROM surat_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<SuratRequest>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, SuratRequest>(
                "SELECT * FROM surat_requests WHERE tracking_code = $1",
            )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?,
        )
    }

    async fn resident_exists(&self, pemohon_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM penduduk WHERE id = $1)")
                .bind(pemohon_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn list(
        &self,
        filter: &SuratFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SuratRequest>, i64), RepositoryError> {
        let items = sqlx::query_as::<_, SuratRequest>(
            r#"
            SELECT * FROM surat_requests
            WHERE ($1::surat_status IS NULL OR status = $1)
              AND ($2::jenis_surat IS NULL OR jenis_surat = $2)
              AND ($3::uuid IS NULL OR pemohon_id = $3)
            ORDER BY tanggal_pengajuan DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.status)
        .bind(filter.jenis_surat)
        .bind(filter.pemohon_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM surat_requests
            WHERE ($1::surat_status IS NULL OR status = $1)
              AND ($2::jenis_surat IS NULL OR jenis_surat = $2)
              AND ($3::uuid IS NULL OR pemohon_id = $3)
            "#,
        )
        .bind(filter.status)
        .bind(filter.jenis_surat)
        .bind(filter.pemohon_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn stats(&self) -> Result<SuratStats, RepositoryError> {
        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM surat_requests GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_jenis = sqlx::query_as::<_, JenisCount>(
            r#"
            SELECT jenis_surat, COUNT(*) AS count FROM surat_requests
            GROUP BY jenis_surat ORDER BY jenis_surat
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(SuratStats {
            total: by_status.iter().map(|c| c.count).sum(),
            by_status,
            by_jenis,
        })
    }
}

/// Transition unit of work. The row read by `find_by_id` stays locked
/// (`FOR UPDATE`) and the numbering advisory lock stays held until commit or
/// rollback; dropping an uncommitted transaction rolls it back.
struct PgSuratTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSuratTransaction {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, RepositoryError> {
        self.tx.as_mut().ok_or(RepositoryError::TransactionClosed)
    }
}

#[async_trait]
impl SuratTransaction for PgSuratTransaction {
    async fn find_by_id(&mut self, id: Uuid) -> Result<Option<SuratRequest>, RepositoryError> {
        let tx = self.tx()?;
        Ok(sqlx::query_as::<_, SuratRequest>(
            "SELECT * FROM surat_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?)
    }

    async fn count_approved_by_type_and_year(
        &mut self,
        jenis: JenisSurat,
        year: i32,
    ) -> Result<i64, RepositoryError> {
        let tx = self.tx()?;

        // Serialise numbering per (jenis, year); released at commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(format!("nomor_surat:{}:{}", jenis.code(), year))
            .execute(&mut **tx)
            .await?;

        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM surat_requests
            WHERE jenis_surat = $1
              AND nomor_surat IS NOT NULL
              AND status IN ('approved', 'completed')
              AND tanggal_disetujui >= make_timestamptz($2, 1, 1, 0, 0, 0, 'UTC')
              AND tanggal_disetujui < make_timestamptz($2 + 1, 1, 1, 0, 0, 0, 'UTC')
            "#,
        )
        .bind(jenis)
        .bind(year)
        .fetch_one(&mut **tx)
        .await?)
    }

    async fn save(&mut self, record: &SuratRequest) -> Result<SuratRequest, RepositoryError> {
        let tx = self.tx()?;
        sqlx::query_as::<_, SuratRequest>(
            r#"
            UPDATE surat_requests SET
                status = $2,
                nomor_surat = $3,
                tanggal_disetujui = $4,
                tanggal_selesai = $5,
                keterangan = $6,
                processed_by = $7,
                approved_by = $8,
                updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.status)
        .bind(&record.nomor_surat)
        .bind(record.tanggal_disetujui)
        .bind(record.tanggal_selesai)
        .bind(&record.keterangan)
        .bind(record.processed_by)
        .bind(record.approved_by)
        .bind(record.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_db_error)
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self.tx.take().ok_or(RepositoryError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}
