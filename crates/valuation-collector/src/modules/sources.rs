//! 파이프라인 및 알림 전송기 구성.

use std::sync::Arc;

use async_trait::async_trait;
use valuation_core::{BondYield, DataSource, InstrumentRecord};
use valuation_data::provider::http_client;
use valuation_data::{
    fetch_bond_yield, ApiSourceAdapter, ExcelSourceAdapter, FallbackPipeline, FetchFailure,
    FileSnapshotStore, HttpBondYieldSource, RetryPolicy, SourceAdapter,
};
use valuation_notification::{DingTalkSender, NotificationManager, NotificationSender};

use crate::{CollectorConfig, Result};

/// API URL이 설정되지 않았을 때 사용하는 소스 (항상 실패).
struct UnconfiguredApiSource;

#[async_trait]
impl SourceAdapter for UnconfiguredApiSource {
    fn source(&self) -> DataSource {
        DataSource::Api
    }

    async fn fetch(&self, _instrument_id: &str) -> std::result::Result<InstrumentRecord, FetchFailure> {
        Err(FetchFailure::new("VALUATION_API_URL이 설정되지 않음"))
    }
}

/// 설정으로부터 폴백 파이프라인을 구성합니다.
///
/// 스냅샷 디렉토리가 없으면 생성합니다.
pub async fn build_pipeline(config: &CollectorConfig) -> Result<FallbackPipeline> {
    let client = http_client(config.request_timeout())?;

    let mut excel = ExcelSourceAdapter::new(client.clone(), &config.excel.base_url);
    for index in config.indexes.all() {
        if let Some(url) = &index.url {
            excel = excel.with_index_url(&index.code, url);
        }
    }

    let (api, api_policy): (Arc<dyn SourceAdapter>, RetryPolicy) = match &config.api.url {
        Some(url) => (
            Arc::new(ApiSourceAdapter::new(client, url)),
            config.api.retry.policy(),
        ),
        None => {
            tracing::warn!("VALUATION_API_URL 미설정, API 소스를 건너뜁니다");
            (Arc::new(UnconfiguredApiSource), RetryPolicy::no_retry())
        }
    };

    let store = FileSnapshotStore::open(&config.snapshot_dir).await?;
    tracing::info!(
        snapshot_dir = %config.snapshot_dir.display(),
        snapshots = store.len().await,
        "스냅샷 저장소 열기 완료"
    );

    Ok(
        FallbackPipeline::new(Arc::new(excel), api, Arc::new(store))
            .with_excel_policy(config.excel.retry.policy())
            .with_api_policy(api_policy),
    )
}

/// 설정된 국채 수익률을 조회합니다.
///
/// `BOND_YIELD_URL`이 없거나 조회에 실패하면 `None`이며, 리포트는 스프레드
/// 없이 작성됩니다.
pub async fn fetch_configured_bond_yield(config: &CollectorConfig) -> Result<Option<BondYield>> {
    let Some(url) = &config.bond.url else {
        tracing::debug!("BOND_YIELD_URL 미설정, 국채 스프레드 생략");
        return Ok(None);
    };

    let client = http_client(config.request_timeout())?;
    let source = HttpBondYieldSource::new(client, url);
    Ok(fetch_bond_yield(&source, &config.bond.retry.policy()).await)
}

/// 환경변수로부터 알림 관리자를 구성합니다.
///
/// `DINGTALK_WEBHOOK`이 없으면 전송기 없는 관리자를 반환합니다.
pub fn build_notifier() -> NotificationManager {
    let mut manager = NotificationManager::new();

    match DingTalkSender::from_env() {
        Some(Ok(sender)) => {
            if !sender.is_enabled() {
                tracing::info!("DingTalk 알림 비활성화 (DINGTALK_ENABLED)");
            }
            manager.add_sender(sender);
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "DingTalk 전송기 생성 실패");
        }
        None => {
            tracing::info!("DINGTALK_WEBHOOK 미설정, 알림을 전송하지 않습니다");
        }
    }

    manager
}
