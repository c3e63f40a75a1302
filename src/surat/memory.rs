//! In-memory repository for tests
//!
//! Every transaction holds the store lock from `begin` until it is dropped,
//! so transitions are fully serialised. Unique constraints mirror the
//! Postgres schema.

use super::{
    RepositoryError, SuratRepository, SuratTransaction, NOMOR_SURAT_CONSTRAINT,
    TRACKING_CODE_CONSTRAINT,
};
use crate::models::{
    JenisCount, JenisSurat, StatusCount, SuratFilter, SuratRequest, SuratStats, SuratStatus,
};
use async_trait::async_trait;
use chrono::Datelike;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    requests: HashMap<Uuid, SuratRequest>,
    residents: HashSet<Uuid>,
}

impl MemoryState {
    fn check_unique(
        requests: &HashMap<Uuid, SuratRequest>,
        record: &SuratRequest,
    ) -> Result<(), RepositoryError> {
        for other in requests.values().filter(|other| other.id != record.id) {
            if other.tracking_code == record.tracking_code {
                return Err(RepositoryError::UniqueViolation {
                    constraint: TRACKING_CODE_CONSTRAINT.to_string(),
                });
            }
            if record.nomor_surat.is_some()
                && other.jenis_surat == record.jenis_surat
                && other.nomor_surat == record.nomor_surat
            {
                return Err(RepositoryError::UniqueViolation {
                    constraint: NOMOR_SURAT_CONSTRAINT.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySuratRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySuratRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_resident(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.residents.insert(id);
        id
    }

    /// Store a record as-is, bypassing the workflow
    pub async fn put(&self, record: SuratRequest) {
        self.state.lock().await.requests.insert(record.id, record);
    }

    pub async fn get(&self, id: Uuid) -> Option<SuratRequest> {
        self.state.lock().await.requests.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<SuratRequest> {
        self.state.lock().await.requests.values().cloned().collect()
    }
}

#[async_trait]
impl SuratRepository for MemorySuratRepository {
    async fn begin(&self) -> Result<Box<dyn SuratTransaction>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            staged: HashMap::new(),
            finished: false,
        }))
    }

    async fn insert(&self, record: &SuratRequest) -> Result<SuratRequest, RepositoryError> {
        let mut state = self.state.lock().await;
        MemoryState::check_unique(&state.requests, record)?;
        state.requests.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SuratRequest>, RepositoryError> {
        Ok(self.get(id).await)
    }

    async fn find_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<SuratRequest>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .values()
            .find(|r| r.tracking_code == code)
            .cloned())
    }

    async fn resident_exists(&self, pemohon_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.residents.contains(&pemohon_id))
    }

    async fn list(
        &self,
        filter: &SuratFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SuratRequest>, i64), RepositoryError> {
        let state = self.state.lock().await;
        let mut matching: Vec<SuratRequest> = state
            .requests
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.jenis_surat.map_or(true, |j| r.jenis_surat == j))
            .filter(|r| filter.pemohon_id.map_or(true, |p| r.pemohon_id == p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.tanggal_pengajuan.cmp(&a.tanggal_pengajuan));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn stats(&self) -> Result<SuratStats, RepositoryError> {
        let state = self.state.lock().await;
        let by_status = SuratStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: state.requests.values().filter(|r| r.status == status).count() as i64,
            })
            .filter(|c| c.count > 0)
            .collect();
        let by_jenis = JenisSurat::ALL
            .into_iter()
            .map(|jenis_surat| JenisCount {
                jenis_surat,
                count: state
                    .requests
                    .values()
                    .filter(|r| r.jenis_surat == jenis_surat)
                    .count() as i64,
            })
            .filter(|c| c.count > 0)
            .collect();

        Ok(SuratStats {
            total: state.requests.len() as i64,
            by_status,
            by_jenis,
        })
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: HashMap<Uuid, SuratRequest>,
    finished: bool,
}

impl MemoryTransaction {
    fn view(&self) -> HashMap<Uuid, SuratRequest> {
        let mut view = self.guard.requests.clone();
        view.extend(self.staged.clone());
        view
    }

    fn ensure_open(&self) -> Result<(), RepositoryError> {
        if self.finished {
            Err(RepositoryError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SuratTransaction for MemoryTransaction {
    async fn find_by_id(&mut self, id: Uuid) -> Result<Option<SuratRequest>, RepositoryError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .get(&id)
            .or_else(|| self.guard.requests.get(&id))
            .cloned())
    }

    async fn count_approved_by_type_and_year(
        &mut self,
        jenis: JenisSurat,
        year: i32,
    ) -> Result<i64, RepositoryError> {
        self.ensure_open()?;
        let count = self
            .view()
            .values()
            .filter(|r| r.jenis_surat == jenis)
            .filter(|r| matches!(r.status, SuratStatus::Approved | SuratStatus::Completed))
            .filter(|r| r.tanggal_disetujui.map(|t| t.year()) == Some(year))
            .count();
        Ok(count as i64)
    }

    async fn save(&mut self, record: &SuratRequest) -> Result<SuratRequest, RepositoryError> {
        self.ensure_open()?;
        let view = self.view();
        if !view.contains_key(&record.id) {
            return Err(RepositoryError::Database(sqlx::Error::RowNotFound));
        }
        MemoryState::check_unique(&view, record)?;
        self.staged.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        let staged = std::mem::take(&mut self.staged);
        self.guard.requests.extend(staged);
        self.finished = true;
        Ok(())
    }
}
