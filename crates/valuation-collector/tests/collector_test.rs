//! 리포트 워크플로우 통합 테스트.
//!
//! 가짜 소스 어댑터와 mockito DingTalk webhook으로 지수별 처리 결과와
//! 알림 전송 횟수를 검증합니다.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use mockito::Matcher;
use rust_decimal_macros::dec;
use valuation_collector::modules::{
    build_pipeline, fetch_configured_bond_yield, run_valuation_reports_with_options,
    ValuationReportOptions, ALL_INDEXES_FAILED,
};
use valuation_collector::CollectorConfig;
use valuation_core::{
    BondYield, DataSource, IndexCatalog, IndexConfig, InstrumentRecord, MetricField,
};
use valuation_data::{
    FallbackPipeline, FetchFailure, MemorySnapshotStore, RetryPolicy, SourceAdapter,
};
use valuation_notification::{DingTalkConfig, DingTalkSender, NotificationManager};

// ============================================================================
// 테스트 헬퍼
// ============================================================================

/// 등록된 지수만 성공하는 어댑터.
struct FixedAdapter {
    source: DataSource,
    records: HashMap<String, InstrumentRecord>,
}

impl FixedAdapter {
    fn new(source: DataSource, records: Vec<InstrumentRecord>) -> Arc<Self> {
        Arc::new(Self {
            source,
            records: records
                .into_iter()
                .map(|r| (r.instrument_id.clone(), r))
                .collect(),
        })
    }
}

#[async_trait]
impl SourceAdapter for FixedAdapter {
    fn source(&self) -> DataSource {
        self.source
    }

    async fn fetch(&self, instrument_id: &str) -> Result<InstrumentRecord, FetchFailure> {
        self.records
            .get(instrument_id)
            .cloned()
            .ok_or_else(|| FetchFailure::new(format!("{} 응답 없음: {}", self.source, instrument_id)))
    }
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn record(id: &str, source: DataSource) -> InstrumentRecord {
    InstrumentRecord::new(id, date(5), source)
        .with_field(MetricField::PeRatio1, Some(dec!(6.9)))
        .with_field(MetricField::DividendYield2, Some(dec!(5.35)))
}

fn indexes() -> Vec<IndexConfig> {
    vec![
        IndexConfig::new("红利低波指数", "H30269"),
        IndexConfig::new("红利低波100指数", "930955"),
    ]
}

fn pipeline(
    excel: Vec<InstrumentRecord>,
    snapshots: Vec<InstrumentRecord>,
) -> FallbackPipeline {
    FallbackPipeline::new(
        FixedAdapter::new(DataSource::Excel, excel),
        FixedAdapter::new(DataSource::Api, vec![]),
        Arc::new(MemorySnapshotStore::with_records(snapshots)),
    )
    .with_excel_policy(RetryPolicy::no_retry())
    .with_api_policy(RetryPolicy::no_retry())
}

fn notifier(server: &mockito::Server) -> NotificationManager {
    let mut manager = NotificationManager::new();
    manager.add_sender(
        DingTalkSender::new(DingTalkConfig::new(format!("{}/robot/send", server.url()))).unwrap(),
    );
    manager
}

fn options(send_summary: bool, dry_run: bool) -> ValuationReportOptions {
    ValuationReportOptions {
        window_days: 15,
        send_summary,
        dry_run,
        today: date(8),
        bond_yield: None,
        report_dir: None,
    }
}

const DINGTALK_OK: &str = r#"{"errcode":0,"errmsg":"ok"}"#;

// ============================================================================
// 리포트 워크플로우
// ============================================================================

#[tokio::test]
async fn test_report_and_data_unavailable_are_both_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/robot/send")
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(2)
        .create_async()
        .await;

    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes(),
        &options(false, false),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.from_snapshot, 0);
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.send_failed, 0);
    assert!(stats.details[0].starts_with("✅ 红利低波指数"));
    assert!(stats.details[1].starts_with("❌ 红利低波100指数"));
}

#[tokio::test]
async fn test_snapshot_report_is_flagged() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex("스냅샷 \\(실시간 수집 실패, 3일 경과\\)".to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(1)
        .create_async()
        .await;

    let pipeline = pipeline(vec![], vec![record("H30269", DataSource::Excel)]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes()[..1],
        &options(false, false),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(stats.success, 1);
    assert_eq!(stats.from_snapshot, 1);
    assert!(stats.details[0].contains("SNAPSHOT"));
}

#[tokio::test]
async fn test_summary_is_sent_after_reports() {
    let mut server = mockito::Server::new_async().await;
    let reports = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex("밸류에이션 리포트".to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(2)
        .create_async()
        .await;
    let summary = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex("수집 요약".to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(1)
        .create_async()
        .await;

    let pipeline = pipeline(
        vec![
            record("H30269", DataSource::Excel),
            record("930955", DataSource::Excel),
        ],
        vec![],
    );
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes(),
        &options(true, false),
    )
    .await;

    reports.assert_async().await;
    summary.assert_async().await;
    assert_eq!(stats.success, 2);
    assert_eq!(stats.sent, 2);
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes(),
        &options(true, true),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.sent, 0);
}

#[tokio::test]
async fn test_webhook_failure_counts_as_send_failed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/robot/send")
        .with_status(200)
        .with_body(r#"{"errcode":310000,"errmsg":"keywords not in content"}"#)
        .create_async()
        .await;

    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes()[..1],
        &options(false, false),
    )
    .await;

    assert_eq!(stats.success, 1);
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.send_failed, 1);
}

#[tokio::test]
async fn test_without_senders_nothing_is_counted_as_sent() {
    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &NotificationManager::new(),
        &indexes()[..1],
        &options(true, false),
    )
    .await;

    assert_eq!(stats.success, 1);
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.send_failed, 0);
}

#[tokio::test]
async fn test_all_failed_sends_system_error() {
    let mut server = mockito::Server::new_async().await;
    let unavailable = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex("데이터 수집 실패".to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(2)
        .create_async()
        .await;
    let system_error = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex(ALL_INDEXES_FAILED.to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(1)
        .create_async()
        .await;

    let pipeline = pipeline(vec![], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes(),
        &options(false, false),
    )
    .await;

    unavailable.assert_async().await;
    system_error.assert_async().await;
    assert!(stats.all_failed());
    assert_eq!(stats.sent, 2);
}

#[tokio::test]
async fn test_partial_failure_sends_no_system_error() {
    let mut server = mockito::Server::new_async().await;
    let _any = server
        .mock("POST", "/robot/send")
        .with_status(200)
        .with_body(DINGTALK_OK)
        .create_async()
        .await;
    let system_error = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex(ALL_INDEXES_FAILED.to_string()))
        .expect(0)
        .create_async()
        .await;

    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats = run_valuation_reports_with_options(
        &pipeline,
        &notifier(&server),
        &indexes(),
        &options(false, false),
    )
    .await;

    system_error.assert_async().await;
    assert!(!stats.all_failed());
}

// ============================================================================
// 국채 스프레드 / 리포트 파일
// ============================================================================

#[tokio::test]
async fn test_bond_spread_is_in_report_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/robot/send")
        .match_body(Matcher::Regex("배당-국채 스프레드: \\*\\*\\+2\\.85%p".to_string()))
        .with_status(200)
        .with_body(DINGTALK_OK)
        .expect(1)
        .create_async()
        .await;

    let mut options = options(false, false);
    options.bond_yield = Some(BondYield {
        as_of_date: date(5),
        yield_10y: dec!(2.50),
        change: None,
    });

    let pipeline = pipeline(vec![record("H30269", DataSource::Excel)], vec![]);
    let stats =
        run_valuation_reports_with_options(&pipeline, &notifier(&server), &indexes()[..1], &options)
            .await;

    mock.assert_async().await;
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn test_report_files_written_even_in_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = options(false, true);
    options.report_dir = Some(dir.path().to_path_buf());

    let pipeline = pipeline(
        vec![record("H30269", DataSource::Excel)],
        vec![record("930955", DataSource::Api)],
    );
    let stats =
        run_valuation_reports_with_options(&pipeline, &NotificationManager::new(), &indexes(), &options)
            .await;

    assert_eq!(stats.success, 2);
    assert_eq!(stats.reports_written, 2);

    let live = std::fs::read_to_string(dir.path().join("H30269").join("2024-01-08.md")).unwrap();
    assert!(live.contains("| 출처 | EXCEL |"));
    assert!(live.contains("## 배당수익률 추이 (최근 1일)"));

    let snapshot =
        std::fs::read_to_string(dir.path().join("930955").join("2024-01-08.md")).unwrap();
    assert!(snapshot.contains("| 출처 | SNAPSHOT (3일 경과) |"));
    assert!(dir.path().join("930955").join("2024-01-08.json").exists());
}

#[tokio::test]
async fn test_configured_bond_yield_is_fetched() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/bond")
        .with_status(200)
        .with_body(r#"{"code":"200","data":[{"date":"20240105","yield10y":2.5}]}"#)
        .create_async()
        .await;

    let mut config = CollectorConfig::default();
    assert_eq!(fetch_configured_bond_yield(&config).await.unwrap(), None);

    config.bond.url = Some(format!("{}/bond", server.url()));
    let bond = fetch_configured_bond_yield(&config).await.unwrap().unwrap();

    mock.assert_async().await;
    assert_eq!(bond.yield_10y, dec!(2.5));
    assert_eq!(bond.as_of_date, date(5));
}

#[tokio::test]
async fn test_bond_yield_failure_is_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/bond")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let mut config = CollectorConfig::default();
    config.bond.url = Some(format!("{}/bond", server.url()));
    config.bond.retry.max_attempts = 1;

    assert_eq!(fetch_configured_bond_yield(&config).await.unwrap(), None);
    mock.assert_async().await;
}

// ============================================================================
// 설정 기반 파이프라인 구성
// ============================================================================

#[tokio::test]
async fn test_build_pipeline_uses_index_url_and_persists_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let excel = server
        .mock("GET", "/custom/h30269.csv")
        .with_status(200)
        .with_body("日期Date,市盈率1P/E1,股息率2D/P2\n20240105,6.90,5.35\n")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = CollectorConfig::default();
    config.snapshot_dir = dir.path().join("snapshots");
    config.excel.base_url = server.url();
    config.excel.retry.max_attempts = 1;
    config.indexes = IndexCatalog::new(vec![IndexConfig::new("红利低波指数", "H30269")
        .with_url(format!("{}/custom/h30269.csv", server.url()))]);

    let pipeline = build_pipeline(&config).await.unwrap();
    let record = pipeline.fetch("H30269").await.unwrap();

    excel.assert_async().await;
    assert_eq!(record.source, DataSource::Excel);
    assert_eq!(record.value(MetricField::DividendYield2), Some(dec!(5.35)));
    assert!(config.snapshot_dir.join("H30269.json").exists());
}

#[tokio::test]
async fn test_build_pipeline_without_api_url_falls_to_no_data() {
    let mut server = mockito::Server::new_async().await;
    let _excel = server
        .mock("GET", Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = CollectorConfig::default();
    config.snapshot_dir = dir.path().to_path_buf();
    config.excel.base_url = server.url();
    config.excel.retry.max_attempts = 1;
    config.api.url = None;

    let pipeline = build_pipeline(&config).await.unwrap();
    let err = pipeline.fetch("H30269").await.unwrap_err();

    assert_eq!(err.instrument_id, "H30269");
    assert_eq!(err.exhausted.len(), 2);
    assert!(err.exhausted[1].last_cause.cause.contains("VALUATION_API_URL"));
}
