//! 스냅샷 저장소.
//!
//! 지수별로 마지막으로 성공한 실시간 수집 결과(EXCEL/API) 하나를 보관합니다.
//! 모든 실시간 소스가 실패했을 때 폴백으로 사용됩니다.
//!
//! - `FileSnapshotStore`: `{dir}/{code}.json` 파일 (임시 파일 + rename으로 원자적 기록)
//! - `MemorySnapshotStore`: 프로세스 메모리 (테스트/드라이런용)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use valuation_core::InstrumentRecord;

use crate::error::StoreError;

/// 스냅샷 저장소 trait.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 저장된 레코드를 조회합니다. 없으면 `None`.
    async fn get(&self, instrument_id: &str) -> Result<Option<InstrumentRecord>, StoreError>;

    /// 레코드를 저장합니다 (같은 지수의 기존 레코드를 덮어씀).
    async fn put(&self, record: &InstrumentRecord) -> Result<(), StoreError>;
}

/// 파일 이름으로 안전한 지수 코드인지 확인합니다.
fn validate_key(instrument_id: &str) -> Result<(), StoreError> {
    let invalid = instrument_id.trim().is_empty()
        || instrument_id.starts_with('.')
        || instrument_id.contains("..")
        || instrument_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());

    if invalid {
        Err(StoreError::InvalidKey(instrument_id.to_string()))
    } else {
        Ok(())
    }
}

// ==================== File Store ====================

/// 디렉터리 기반 스냅샷 저장소.
///
/// 열 때 디렉터리의 모든 스냅샷을 읽어 메모리에 올리고, 기록은 파일과
/// 메모리에 함께 반영합니다. 같은 지수에 대한 접근은 지수별 잠금으로
/// 직렬화됩니다.
pub struct FileSnapshotStore {
    dir: PathBuf,
    records: RwLock<HashMap<String, InstrumentRecord>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileSnapshotStore {
    /// 저장소를 엽니다. 디렉터리가 없으면 생성합니다.
    ///
    /// 읽을 수 없는 스냅샷 파일은 경고 후 건너뜁니다.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut records = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match load_record(&path).await {
                Ok(record) => {
                    records.insert(record.instrument_id.clone(), record);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "스냅샷 파일 로드 실패, 건너뜀");
                }
            }
        }

        info!(dir = %dir.display(), count = records.len(), "스냅샷 저장소 열림");

        Ok(Self {
            dir,
            records: RwLock::new(records),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// 저장소 디렉터리.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 저장된 스냅샷 수.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// 비어 있는지 여부.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn path_for(&self, instrument_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", instrument_id))
    }

    async fn key_lock(&self, instrument_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(instrument_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

async fn load_record(path: &Path) -> Result<InstrumentRecord, StoreError> {
    let content = tokio::fs::read(path).await?;
    let record: InstrumentRecord = serde_json::from_slice(&content)?;

    // 파일 이름과 레코드의 지수 코드가 다르면 잘못된 파일
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem != record.instrument_id {
        return Err(StoreError::InvalidKey(format!(
            "{} (파일 이름 {} 불일치)",
            record.instrument_id, stem
        )));
    }
    Ok(record)
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, instrument_id: &str) -> Result<Option<InstrumentRecord>, StoreError> {
        validate_key(instrument_id)?;
        let lock = self.key_lock(instrument_id).await;
        let _guard = lock.lock().await;

        Ok(self.records.read().await.get(instrument_id).cloned())
    }

    async fn put(&self, record: &InstrumentRecord) -> Result<(), StoreError> {
        let instrument_id = record.instrument_id.as_str();
        validate_key(instrument_id)?;
        let lock = self.key_lock(instrument_id).await;
        let _guard = lock.lock().await;

        let content = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(instrument_id);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", instrument_id));

        tokio::fs::write(&tmp_path, &content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        self.records
            .write()
            .await
            .insert(instrument_id.to_string(), record.clone());

        debug!(
            index = instrument_id,
            as_of = %record.as_of_date,
            path = %path.display(),
            "스냅샷 저장"
        );
        Ok(())
    }
}

// ==================== Memory Store ====================

/// 메모리 스냅샷 저장소.
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: RwLock<HashMap<String, InstrumentRecord>>,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드가 미리 채워진 저장소를 생성합니다 (기록 횟수에 포함되지 않음).
    pub fn with_records(records: impl IntoIterator<Item = InstrumentRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.instrument_id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
            writes: AtomicUsize::new(0),
        }
    }

    /// 지금까지의 `put` 호출 횟수.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, instrument_id: &str) -> Result<Option<InstrumentRecord>, StoreError> {
        validate_key(instrument_id)?;
        Ok(self.records.read().await.get(instrument_id).cloned())
    }

    async fn put(&self, record: &InstrumentRecord) -> Result<(), StoreError> {
        validate_key(&record.instrument_id)?;
        self.records
            .write()
            .await
            .insert(record.instrument_id.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
