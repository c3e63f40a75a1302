//! Surat state machine
//!
//! ```text
//! pending    --approve--------> approved
//! pending    --reject---------> rejected
//! pending    --mark_processing> processing
//! processing --approve--------> approved
//! processing --reject---------> rejected
//! approved   --complete-------> completed
//! ```

use super::identifiers::{nomor_surat, tracking_code};
use super::{
    Clock, IdentifierGenerator, RepositoryError, Result, SuratError, SuratRepository,
    SuratTransaction, NOMOR_SURAT_CONSTRAINT, TRACKING_CODE_CONSTRAINT,
};
use crate::models::{
    page_offset, JenisCount, JenisSurat, StatusCount, SubmitSurat, SuratFilter, SuratRequest,
    SuratStats, SuratStatus,
};
use chrono::Datelike;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts at inserting a request before a tracking-code collision is
/// reported as a conflict
const MAX_TRACKING_CODE_ATTEMPTS: usize = 5;

const TRACKING_SUFFIX_LEN: usize = 3;

pub struct SuratWorkflow {
    repository: Arc<dyn SuratRepository>,
    clock: Arc<dyn Clock>,
    identifiers: Arc<dyn IdentifierGenerator>,
}

impl SuratWorkflow {
    pub fn new(
        repository: Arc<dyn SuratRepository>,
        clock: Arc<dyn Clock>,
        identifiers: Arc<dyn IdentifierGenerator>,
    ) -> Self {
        Self {
            repository,
            clock,
            identifiers,
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Create a new request in `pending` status
    pub async fn submit(&self, input: SubmitSurat) -> Result<SuratRequest> {
        let jenis_surat = input
            .jenis_surat
            .parse::<JenisSurat>()
            .map_err(|e| SuratError::InvalidArgument {
                field: "jenis_surat",
                message: e.to_string(),
            })?;

        if !self.repository.resident_exists(input.pemohon_id).await? {
            return Err(SuratError::NotFound {
                entity: "Penduduk",
                key: input.pemohon_id.to_string(),
            });
        }

        if input.keperluan.trim().is_empty() {
            return Err(SuratError::InvalidArgument {
                field: "keperluan",
                message: "must not be empty".to_string(),
            });
        }

        let now = self.clock.now();
        let mut record = SuratRequest {
            id: Uuid::new_v4(),
            jenis_surat,
            pemohon_id: input.pemohon_id,
            keperluan: input.keperluan,
            status: SuratStatus::Pending,
            tracking_code: String::new(),
            nomor_surat: None,
            tanggal_pengajuan: now,
            tanggal_disetujui: None,
            tanggal_selesai: None,
            keterangan: None,
            processed_by: None,
            approved_by: None,
            template_data: input.template_data,
            updated_at: now,
        };

        for attempt in 1..=MAX_TRACKING_CODE_ATTEMPTS {
            let suffix = self.identifiers.random_base36(TRACKING_SUFFIX_LEN);
            record.tracking_code = tracking_code(jenis_surat, self.clock.now(), &suffix);

            match self.repository.insert(&record).await {
                Ok(created) => {
                    tracing::info!(
                        "Surat {} submitted ({}, tracking code {})",
                        created.id,
                        created.jenis_surat,
                        created.tracking_code
                    );
                    return Ok(created);
                }
                Err(RepositoryError::UniqueViolation { constraint })
                    if constraint == TRACKING_CODE_CONSTRAINT =>
                {
                    tracing::warn!(
                        "Tracking code {} already taken (attempt {}/{})",
                        record.tracking_code,
                        attempt,
                        MAX_TRACKING_CODE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SuratError::Conflict(format!(
            "could not generate a unique tracking code after {} attempts",
            MAX_TRACKING_CODE_ATTEMPTS
        )))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// `pending -> processing`
    pub async fn mark_processing(&self, id: Uuid, staff_id: Uuid) -> Result<SuratRequest> {
        let mut tx = self.repository.begin().await?;
        let mut record = load_for_transition(tx.as_mut(), id, SuratStatus::Processing).await?;

        record.status = SuratStatus::Processing;
        record.processed_by = Some(staff_id);
        record.updated_at = self.clock.now();

        let saved = save_and_commit(tx.as_mut(), &record).await?;
        tracing::info!("Surat {} marked as processing by {}", id, staff_id);
        Ok(saved)
    }

    /// `pending | processing -> approved`, assigning the official number
    pub async fn approve(&self, id: Uuid, staff_id: Uuid) -> Result<SuratRequest> {
        let mut tx = self.repository.begin().await?;
        let mut record = load_for_transition(tx.as_mut(), id, SuratStatus::Approved).await?;

        if let Some(existing) = &record.nomor_surat {
            return Err(SuratError::Conflict(format!(
                "surat {} already has nomor_surat {}",
                id, existing
            )));
        }

        let now = self.clock.now();
        let approved_this_year = tx
            .count_approved_by_type_and_year(record.jenis_surat, now.year())
            .await?;
        let nomor = nomor_surat(record.jenis_surat, approved_this_year + 1, now);

        record.status = SuratStatus::Approved;
        record.approved_by = Some(staff_id);
        record.tanggal_disetujui = Some(now);
        record.nomor_surat = Some(nomor.clone());
        record.updated_at = now;

        let saved = tx.save(&record).await.map_err(|e| match e {
            RepositoryError::UniqueViolation { constraint } if constraint == NOMOR_SURAT_CONSTRAINT => {
                SuratError::Conflict(format!("nomor_surat {} is already in use", nomor))
            }
            other => other.into(),
        })?;
        tx.commit().await?;
        tracing::info!("Surat {} approved by {} as {}", id, staff_id, nomor);
        Ok(saved)
    }

    /// `pending | processing -> rejected`
    pub async fn reject(&self, id: Uuid, staff_id: Uuid, keterangan: String) -> Result<SuratRequest> {
        let mut tx = self.repository.begin().await?;
        let mut record = load_for_transition(tx.as_mut(), id, SuratStatus::Rejected).await?;

        let now = self.clock.now();
        record.status = SuratStatus::Rejected;
        record.processed_by = Some(staff_id);
        record.keterangan = Some(keterangan);
        record.tanggal_selesai = Some(now);
        record.updated_at = now;

        let saved = save_and_commit(tx.as_mut(), &record).await?;
        tracing::info!("Surat {} rejected by {}", id, staff_id);
        Ok(saved)
    }

    /// `approved -> completed`
    pub async fn complete(&self, id: Uuid, staff_id: Uuid) -> Result<SuratRequest> {
        let mut tx = self.repository.begin().await?;
        let mut record = load_for_transition(tx.as_mut(), id, SuratStatus::Completed).await?;

        let now = self.clock.now();
        record.status = SuratStatus::Completed;
        record.processed_by = Some(staff_id);
        record.tanggal_selesai = Some(now);
        record.updated_at = now;

        let saved = save_and_commit(tx.as_mut(), &record).await?;
        tracing::info!("Surat {} completed by {}", id, staff_id);
        Ok(saved)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn lookup_by_tracking_code(&self, code: &str) -> Result<SuratRequest> {
        self.repository
            .find_by_tracking_code(code)
            .await?
            .ok_or_else(|| SuratError::NotFound {
                entity: "Surat",
                key: code.to_string(),
            })
    }

    pub async fn get(&self, id: Uuid) -> Result<SuratRequest> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| SuratError::NotFound {
                entity: "Surat",
                key: id.to_string(),
            })
    }

    /// One page of requests plus the total number of matches
    pub async fn list(
        &self,
        filter: &SuratFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<SuratRequest>, i64)> {
        Ok(self
            .repository
            .list(filter, per_page, page_offset(page, per_page))
            .await?)
    }

    /// Counts for every status and every letter type, zero included
    pub async fn stats(&self) -> Result<SuratStats> {
        let stats = self.repository.stats().await?;

        let by_status = SuratStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: stats
                    .by_status
                    .iter()
                    .find(|c| c.status == status)
                    .map_or(0, |c| c.count),
            })
            .collect();
        let by_jenis = JenisSurat::ALL
            .into_iter()
            .map(|jenis_surat| JenisCount {
                jenis_surat,
                count: stats
                    .by_jenis
                    .iter()
                    .find(|c| c.jenis_surat == jenis_surat)
                    .map_or(0, |c| c.count),
            })
            .collect();

        Ok(SuratStats {
            total: stats.total,
            by_status,
            by_jenis,
        })
    }
}

async fn load_for_transition(
    tx: &mut dyn SuratTransaction,
    id: Uuid,
    requested: SuratStatus,
) -> Result<SuratRequest> {
    let record = tx.find_by_id(id).await?.ok_or_else(|| SuratError::NotFound {
        entity: "Surat",
        key: id.to_string(),
    })?;

    if !record.status.can_transition_to(requested) {
        return Err(SuratError::InvalidTransition {
            current: record.status,
            requested,
        });
    }

    Ok(record)
}

async fn save_and_commit(
    tx: &mut dyn SuratTransaction,
    record: &SuratRequest,
) -> Result<SuratRequest> {
    let saved = tx.save(record).await?;
    tx.commit().await?;
    Ok(saved)
}
