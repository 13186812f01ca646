//! 폴백 파이프라인.
//!
//! 수집 순서:
//! 1. Excel 소스 (재시도 정책 적용)
//! 2. API 소스 (재시도 정책 적용)
//! 3. 스냅샷 저장소
//! 4. 모두 실패 시 `NoDataAvailable`
//!
//! 실시간 소스가 성공하면 결과를 스냅샷에 기록한 뒤 반환합니다.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use valuation_core::{DataSource, InstrumentRecord};

use crate::error::{NoDataAvailable, SourceExhausted};
use crate::provider::SourceAdapter;
use crate::retry::RetryPolicy;
use crate::snapshot::SnapshotStore;

/// Excel → API → 스냅샷 순서의 수집 파이프라인.
///
/// 호출 간에 상태를 유지하지 않습니다.
pub struct FallbackPipeline {
    excel: Arc<dyn SourceAdapter>,
    api: Arc<dyn SourceAdapter>,
    store: Arc<dyn SnapshotStore>,
    excel_policy: RetryPolicy,
    api_policy: RetryPolicy,
}

impl FallbackPipeline {
    /// 기본 재시도 정책으로 파이프라인을 생성합니다.
    pub fn new(
        excel: Arc<dyn SourceAdapter>,
        api: Arc<dyn SourceAdapter>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            excel,
            api,
            store,
            excel_policy: RetryPolicy::excel_default(),
            api_policy: RetryPolicy::api_default(),
        }
    }

    /// Excel 소스 재시도 정책을 지정합니다.
    pub fn with_excel_policy(mut self, policy: RetryPolicy) -> Self {
        self.excel_policy = policy;
        self
    }

    /// API 소스 재시도 정책을 지정합니다.
    pub fn with_api_policy(mut self, policy: RetryPolicy) -> Self {
        self.api_policy = policy;
        self
    }

    /// 지수 지표를 조회합니다.
    pub async fn fetch(&self, instrument_id: &str) -> Result<InstrumentRecord, NoDataAvailable> {
        let mut exhausted = Vec::with_capacity(2);

        for (adapter, policy) in [
            (&self.excel, &self.excel_policy),
            (&self.api, &self.api_policy),
        ] {
            match self.fetch_live(adapter.as_ref(), policy, instrument_id).await {
                Ok(record) => {
                    self.save_snapshot(&record).await;
                    return Ok(record);
                }
                Err(failure) => {
                    warn!(
                        index = instrument_id,
                        source = %failure.data_source,
                        attempts = failure.attempts,
                        error = %failure.last_cause,
                        "소스 실패, 다음 단계로 전환"
                    );
                    exhausted.push(failure);
                }
            }
        }

        match self.store.get(instrument_id).await {
            Ok(Some(record)) => {
                let stale_days = record.stale_days(Utc::now().date_naive());
                warn!(
                    index = instrument_id,
                    as_of = %record.as_of_date,
                    stale_days = stale_days,
                    origin = %record.source,
                    "실시간 소스 모두 실패, 스냅샷 사용"
                );
                Ok(record.with_source(DataSource::Snapshot))
            }
            Ok(None) => {
                error!(index = instrument_id, "사용 가능한 데이터 없음 (스냅샷 없음)");
                Err(NoDataAvailable {
                    instrument_id: instrument_id.to_string(),
                    exhausted,
                })
            }
            Err(e) => {
                error!(index = instrument_id, error = %e, "스냅샷 조회 실패, 데이터 없음으로 처리");
                Err(NoDataAvailable {
                    instrument_id: instrument_id.to_string(),
                    exhausted,
                })
            }
        }
    }

    async fn fetch_live(
        &self,
        adapter: &dyn SourceAdapter,
        policy: &RetryPolicy,
        instrument_id: &str,
    ) -> Result<InstrumentRecord, SourceExhausted> {
        let data_source = adapter.source();
        let label = format!("{}:{}", data_source, instrument_id);

        match policy.run(&label, || adapter.fetch(instrument_id)).await {
            Ok(record) => {
                info!(
                    index = instrument_id,
                    source = %record.source,
                    as_of = %record.as_of_date,
                    "지표 수집 성공"
                );
                Ok(record)
            }
            Err(last_cause) => Err(SourceExhausted {
                data_source,
                attempts: policy.max_attempts,
                last_cause,
            }),
        }
    }

    /// 스냅샷 기록 실패는 로그만 남기고 수집 결과에는 영향을 주지 않습니다.
    /// 실시간 출처가 아닌 레코드는 기록하지 않습니다.
    async fn save_snapshot(&self, record: &InstrumentRecord) {
        if !record.source.is_live() {
            warn!(
                index = %record.instrument_id,
                source = %record.source,
                "실시간 출처가 아닌 레코드, 스냅샷 기록 생략"
            );
            return;
        }

        if let Err(e) = self.store.put(record).await {
            warn!(
                index = %record.instrument_id,
                error = %e,
                "스냅샷 저장 실패"
            );
        }
    }
}
