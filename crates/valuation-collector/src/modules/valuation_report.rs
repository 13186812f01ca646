//! 지수 밸류에이션 리포트 모듈.
//!
//! 지수마다 파이프라인으로 지표를 수집하고 리포트를 작성해 알림으로 보냅니다.
//! 한 지수의 실패는 다른 지수 처리에 영향을 주지 않습니다. 선택된 지수가
//! 모두 실패하면 시스템 오류 알림을 추가로 보냅니다.

use crate::modules::{fetch_configured_bond_yield, save_report};
use crate::{CollectionStats, CollectorConfig};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Instrument;
use valuation_analytics::{today_shanghai, ValuationReport};
use valuation_core::{index_span, BondYield, IndexConfig};
use valuation_data::FallbackPipeline;
use valuation_notification::NotificationManager;

/// 모든 지수 수집 실패 시스템 오류 코드
pub const ALL_INDEXES_FAILED: &str = "ALL_INDEXES_FAILED";

/// 리포트 실행 옵션
#[derive(Debug, Clone)]
pub struct ValuationReportOptions {
    /// 배당수익률 통계 기간 (일)
    pub window_days: usize,
    /// 수집 요약 알림 전송 여부
    pub send_summary: bool,
    /// 알림 없이 리포트만 작성
    pub dry_run: bool,
    /// 리포트 작성일
    pub today: NaiveDate,
    /// 배당 스프레드 비교용 국채 수익률
    pub bond_yield: Option<BondYield>,
    /// 리포트 파일 디렉토리
    pub report_dir: Option<PathBuf>,
}

impl ValuationReportOptions {
    /// 설정에서 옵션 생성 (작성일은 Asia/Shanghai 기준 오늘, 국채 수익률 없음)
    pub fn from_config(config: &CollectorConfig, dry_run: bool) -> Self {
        Self {
            window_days: config.report.window_days,
            send_summary: config.report.send_summary,
            dry_run,
            today: today_shanghai(),
            bond_yield: None,
            report_dir: config.report.output_dir.clone(),
        }
    }
}

/// 선택된 지수의 리포트를 작성하고 전송
///
/// 국채 수익률은 실행마다 한 번 조회해 모든 지수에 사용합니다.
pub async fn run_valuation_reports(
    pipeline: &FallbackPipeline,
    notifier: &NotificationManager,
    indexes: &[IndexConfig],
    config: &CollectorConfig,
    dry_run: bool,
) -> crate::Result<CollectionStats> {
    let mut options = ValuationReportOptions::from_config(config, dry_run);
    options.bond_yield = fetch_configured_bond_yield(config).await?;
    Ok(run_valuation_reports_with_options(pipeline, notifier, indexes, &options).await)
}

/// 옵션을 지정하여 리포트 작성 및 전송
pub async fn run_valuation_reports_with_options(
    pipeline: &FallbackPipeline,
    notifier: &NotificationManager,
    indexes: &[IndexConfig],
    options: &ValuationReportOptions,
) -> CollectionStats {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    let deliver = !options.dry_run && notifier.enabled_count() > 0;
    tracing::info!(
        indexes = indexes.len(),
        window_days = options.window_days,
        bond_yield = ?options.bond_yield.map(|b| b.yield_10y),
        dry_run = options.dry_run,
        deliver,
        "밸류에이션 리포트 시작"
    );

    for index in indexes {
        let span = index_span!("valuation_report", index.code);
        process_index(pipeline, notifier, index, options, deliver, &mut stats)
            .instrument(span)
            .await;
    }

    if stats.all_failed() && deliver {
        let message = format!(
            "선택된 지수 {}개 모두 데이터 없음 (실시간 소스와 스냅샷 모두 실패)",
            stats.total
        );
        if let Err(e) = notifier.notify_system_error(ALL_INDEXES_FAILED, &message).await {
            tracing::warn!(error = %e, "시스템 오류 알림 전송 실패");
        }
    }

    if options.send_summary && deliver {
        let result = notifier
            .notify_summary(
                &options.today.to_string(),
                stats.total,
                stats.success,
                stats.from_snapshot,
                stats.details.clone(),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "수집 요약 전송 실패");
        }
    }

    stats.elapsed = start.elapsed();
    stats
}

/// 지수 하나 처리
async fn process_index(
    pipeline: &FallbackPipeline,
    notifier: &NotificationManager,
    index: &IndexConfig,
    options: &ValuationReportOptions,
    deliver: bool,
    stats: &mut CollectionStats,
) {
    stats.total += 1;

    let record = match pipeline.fetch(&index.code).await {
        Ok(record) => record,
        Err(no_data) => {
            stats.errors += 1;
            stats
                .details
                .push(format!("❌ {} ({}): 데이터 없음", index.name, index.code));
            tracing::error!(error = %no_data, "지표 수집 실패");

            if deliver {
                let result = notifier
                    .notify_data_unavailable(&index.name, &index.code, &no_data.to_string())
                    .await;
                record_delivery(stats, result);
            }
            return;
        }
    };

    let report = ValuationReport::build(index, &record, options.today, options.window_days)
        .with_bond_yield(options.bond_yield);
    stats.success += 1;
    if report.is_snapshot() {
        stats.from_snapshot += 1;
    }

    let status = if report.is_snapshot() { "⚠️" } else { "✅" };
    stats.details.push(format!(
        "{} {} ({}): {} 기준, {}",
        status,
        index.name,
        index.code,
        report.as_of_date,
        report.source.as_str()
    ));

    tracing::info!(
        as_of = %report.as_of_date,
        source = %report.source.as_str(),
        stale_days = report.stale_days,
        pe_percentile = ?report.pe_percentile,
        spread = ?report.dividend_bond_spread,
        "리포트 작성 완료"
    );

    if let Some(dir) = &options.report_dir {
        match save_report(dir, &report).await {
            Ok(path) => {
                stats.reports_written += 1;
                tracing::info!(path = %path.display(), "리포트 파일 저장 완료");
            }
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "리포트 파일 저장 실패"),
        }
    }

    if options.dry_run {
        match serde_json::to_string(&report) {
            Ok(json) => tracing::info!(report = %json, "dry-run: 알림 전송 생략"),
            Err(e) => tracing::warn!(error = %e, "리포트 직렬화 실패"),
        }
        return;
    }

    if deliver {
        let result = notifier.notify_report(report).await;
        record_delivery(stats, result);
    }
}

/// 알림 전송 결과를 통계에 반영
fn record_delivery<E: std::fmt::Display>(stats: &mut CollectionStats, result: Result<(), E>) {
    match result {
        Ok(()) => stats.sent += 1,
        Err(e) => {
            stats.send_failed += 1;
            tracing::warn!(error = %e, "알림 전송 실패");
        }
    }
}
