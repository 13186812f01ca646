//! DingTalk 로봇 알림 서비스.
//!
//! 그룹 로봇 webhook으로 markdown/text 메시지를 전송합니다.
//! 응답의 `errcode`가 0일 때만 성공으로 처리합니다.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use valuation_analytics::ValuationReport;
use valuation_core::DataSource;

use crate::types::{
    Notification, NotificationError, NotificationEvent, NotificationPriority, NotificationResult,
    NotificationSender,
};

/// 전송 속도 제한 응답 코드 (분당 20건 초과).
const ERRCODE_RATE_LIMITED: i64 = 130101;

/// DingTalk 알림 전송 설정.
#[derive(Debug, Clone)]
pub struct DingTalkConfig {
    /// 로봇 webhook URL (access_token 포함)
    pub webhook_url: SecretString,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl DingTalkConfig {
    /// 새 DingTalk 설정을 생성합니다.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: SecretString::new(webhook_url.into().into()),
            enabled: true,
            timeout: Duration::from_secs(30),
        }
    }

    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `DINGTALK_WEBHOOK`이 없으면 `None`을 반환합니다.
    pub fn from_env() -> Option<Self> {
        let webhook_url = std::env::var("DINGTALK_WEBHOOK")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let enabled = std::env::var("DINGTALK_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        Some(Self {
            enabled,
            ..Self::new(webhook_url)
        })
    }
}

/// DingTalk markdown 메시지.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DingTalkMessage {
    /// 알림 목록에 표시되는 제목
    pub title: String,
    /// markdown 본문
    pub text: String,
}

/// DingTalk API 응답.
#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    #[serde(default = "unknown_errcode")]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

fn unknown_errcode() -> i64 {
    -1
}

/// 결측이면 N/A, 아니면 소수점 `dp`자리.
fn fmt_value(value: Option<Decimal>, dp: u32) -> String {
    match value {
        Some(v) => format!("{:.*}", dp as usize, v.round_dp(dp)),
        None => "N/A".to_string(),
    }
}

/// 결측이면 N/A, 아니면 부호를 붙인 소수점 2자리.
fn fmt_signed(value: Option<Decimal>) -> String {
    match value {
        Some(v) if v >= Decimal::ZERO => format!("+{:.2}", v.round_dp(2)),
        Some(v) => format!("{:.2}", v.round_dp(2)),
        None => "N/A".to_string(),
    }
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::Excel => "지표 파일",
        DataSource::Api => "지표 API",
        DataSource::Snapshot => "스냅샷",
    }
}

/// DingTalk 알림 전송기.
pub struct DingTalkSender {
    config: DingTalkConfig,
    client: reqwest::Client,
}

impl DingTalkSender {
    /// 새 DingTalk 전송기를 생성합니다.
    pub fn new(config: DingTalkConfig) -> NotificationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::InvalidConfig(format!("HTTP 클라이언트 생성 실패: {}", e)))?;
        Ok(Self { config, client })
    }

    /// 환경 변수에서 전송기를 생성합니다.
    pub fn from_env() -> Option<NotificationResult<Self>> {
        DingTalkConfig::from_env().map(Self::new)
    }

    /// 리포트를 markdown 메시지로 포맷합니다.
    fn format_report(report: &ValuationReport) -> DingTalkMessage {
        let index = &report.index;
        let title = format!(
            "📈 {} 밸류에이션 리포트 - {} ({})",
            index.name, report.report_date, index.code
        );

        let source = if report.is_snapshot() {
            format!(
                "{} (실시간 수집 실패, {}일 경과)",
                source_label(report.source),
                report.stale_days
            )
        } else {
            source_label(report.source).to_string()
        };

        let stats = report.dividend.as_ref();
        let window = report.window;
        let bond = match &report.bond_yield {
            Some(bond) => format!(
                "- 10년 국채: **{}%** (변화 {}%p)\n\
                 - 배당-국채 스프레드: **{}%p**\n",
                fmt_value(Some(bond.yield_10y), 2),
                fmt_signed(bond.change),
                fmt_signed(report.dividend_bond_spread),
            ),
            None => String::new(),
        };
        let text = format!(
            "## {title}\n\n\
             📊 **핵심 지표**\n\
             - 기준일: {as_of}\n\
             - 데이터 출처: {source}\n\
             - P/E1: **{pe1}** / P/E2: **{pe2}**\n\
             - 배당수익률1: **{dp1}%** / 배당수익률2: **{dp2}%**\n\
             - {window}일 평균: **{avg}%**\n\
             - 기간 범위: **{min}%** ~ **{max}%**\n\
             - 전일 대비: **{change}%**\n\
             - 기간 백분위: **{percentile}%**\n\
             - P/E 백분위: **{pe_percentile}%**\n\
             {bond}\n\
             🎯 **추세 분석**\n\
             {trend}\n\n\
             💡 **투자 참고**\n\
             {advice}\n\n\
             ---\n\
             📈 *밸류에이션 수집기 자동 발송*",
            as_of = report.as_of_date,
            pe1 = fmt_value(report.pe_ratio_1, 2),
            pe2 = fmt_value(report.pe_ratio_2, 2),
            dp1 = fmt_value(report.dividend_yield_1, 4),
            dp2 = fmt_value(report.dividend_yield_2, 4),
            avg = fmt_value(stats.map(|s| s.average), 4),
            min = fmt_value(stats.map(|s| s.min), 4),
            max = fmt_value(stats.map(|s| s.max), 4),
            change = fmt_signed(stats.and_then(|s| s.change_percent)),
            percentile = fmt_value(stats.map(|s| s.percentile), 1),
            pe_percentile = fmt_value(report.pe_percentile, 1),
            trend = report.trend,
            advice = report.advice,
        );

        DingTalkMessage { title, text }
    }

    /// 알림을 DingTalk markdown 메시지로 포맷합니다.
    pub fn format_message(&self, notification: &Notification) -> DingTalkMessage {
        let priority_emoji = match notification.priority {
            NotificationPriority::Low => "ℹ️",
            NotificationPriority::Normal => "📊",
            NotificationPriority::High => "⚠️",
            NotificationPriority::Critical => "🚨",
        };

        let mut message = match &notification.event {
            NotificationEvent::ValuationReport { report } => Self::format_report(report),
            NotificationEvent::DataUnavailable {
                index_name,
                index_code,
                reason,
            } => {
                let title = format!("⚠️ {index_name} 데이터 수집 실패");
                DingTalkMessage {
                    text: format!(
                        "## {title}\n\n\
                         지수: {index_name} ({index_code})\n\n\
                         모든 데이터 소스와 스냅샷이 실패했습니다.\n\n\
                         > {reason}"
                    ),
                    title,
                }
            }
            NotificationEvent::CollectionSummary {
                date,
                total,
                success,
                from_snapshot,
                failed,
                details,
            } => {
                let title = format!("📋 수집 요약 ({date})");
                let lines: String = details.iter().map(|line| format!("- {line}\n")).collect();
                DingTalkMessage {
                    text: format!(
                        "## {title}\n\n\
                         전체: {total}건\n\
                         성공: {success}건 (스냅샷 {from_snapshot}건)\n\
                         실패: {failed}건\n\n\
                         {lines}"
                    ),
                    title,
                }
            }
            NotificationEvent::SystemError {
                error_code,
                message,
            } => {
                let title = format!("{priority_emoji} 시스템 오류");
                DingTalkMessage {
                    text: format!(
                        "## {title}\n\n\
                         코드: `{error_code}`\n\n\
                         메시지: {message}"
                    ),
                    title,
                }
            }
        };

        let timestamp = notification.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
        message.text = format!("{}\n\n*🕐 {}*", message.text.trim_end(), timestamp);
        message
    }

    /// webhook에 원시 메시지를 전송합니다.
    async fn post(&self, payload: &serde_json::Value) -> NotificationResult<()> {
        debug!(msgtype = %payload["msgtype"], "Sending DingTalk message");

        let response = self
            .client
            .post(self.config.webhook_url.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(NotificationError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "DingTalk webhook HTTP 오류");
            return Err(NotificationError::SendFailed(format!("HTTP {}: {}", status, body)));
        }

        let result: DingTalkResponse = response.json().await?;
        match result.errcode {
            0 => {
                info!("DingTalk notification sent successfully");
                Ok(())
            }
            ERRCODE_RATE_LIMITED => {
                warn!(errmsg = %result.errmsg, "DingTalk rate limited");
                Err(NotificationError::RateLimited(60))
            }
            errcode => {
                error!(errcode = errcode, errmsg = %result.errmsg, "DingTalk API 오류");
                Err(NotificationError::SendFailed(format!(
                    "errcode {}: {}",
                    errcode, result.errmsg
                )))
            }
        }
    }

    /// markdown 메시지를 전송합니다.
    pub async fn send_markdown(&self, message: &DingTalkMessage) -> NotificationResult<()> {
        let payload = serde_json::json!({
            "msgtype": "markdown",
            "markdown": {
                "title": message.title,
                "text": message.text,
            },
        });
        self.post(&payload).await
    }

    /// text 메시지를 전송합니다.
    pub async fn send_text(&self, content: &str) -> NotificationResult<()> {
        let payload = serde_json::json!({
            "msgtype": "text",
            "text": { "content": content },
        });
        self.post(&payload).await
    }

    /// 연결 테스트 메시지를 전송합니다.
    pub async fn test_connection(&self) -> NotificationResult<()> {
        let content = format!(
            "🔔 밸류에이션 수집기 연결 테스트 - {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.send_text(&content).await
    }
}

#[async_trait]
impl NotificationSender for DingTalkSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("DingTalk notifications are disabled, skipping");
            return Ok(());
        }

        let message = self.format_message(notification);
        self.send_markdown(&message).await
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.webhook_url.expose_secret().is_empty()
    }

    fn name(&self) -> &str {
        "dingtalk"
    }
}

/// 여러 전송기를 관리하는 알림 관리자.
pub struct NotificationManager {
    senders: Vec<Box<dyn NotificationSender>>,
}

impl NotificationManager {
    /// 새 알림 관리자를 생성합니다.
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    /// 알림 전송기를 추가합니다.
    pub fn add_sender<S: NotificationSender + 'static>(&mut self, sender: S) {
        self.senders.push(Box::new(sender));
    }

    /// 활성화된 전송기 수.
    pub fn enabled_count(&self) -> usize {
        self.senders.iter().filter(|s| s.is_enabled()).count()
    }

    /// 활성화된 모든 전송기를 통해 알림을 전송합니다.
    ///
    /// 활성화된 전송기가 모두 실패한 경우에만 마지막 에러를 반환합니다.
    pub async fn notify(&self, notification: &Notification) -> NotificationResult<()> {
        let mut last_error = None;
        let mut failures = 0;

        for sender in self.senders.iter().filter(|s| s.is_enabled()) {
            if let Err(e) = sender.send(notification).await {
                error!(sender = sender.name(), error = %e, "Failed to send notification");
                failures += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failures == self.enabled_count() => Err(e),
            _ => Ok(()),
        }
    }

    /// 밸류에이션 리포트 알림을 전송합니다.
    pub async fn notify_report(&self, report: ValuationReport) -> NotificationResult<()> {
        self.notify(&Notification::report(report)).await
    }

    /// 데이터 수집 실패 알림을 전송합니다.
    pub async fn notify_data_unavailable(
        &self,
        index_name: &str,
        index_code: &str,
        reason: &str,
    ) -> NotificationResult<()> {
        let notification = Notification::new(NotificationEvent::DataUnavailable {
            index_name: index_name.to_string(),
            index_code: index_code.to_string(),
            reason: reason.to_string(),
        })
        .with_priority(NotificationPriority::High);

        self.notify(&notification).await
    }

    /// 수집 요약 알림을 전송합니다.
    pub async fn notify_summary(
        &self,
        date: &str,
        total: usize,
        success: usize,
        from_snapshot: usize,
        details: Vec<String>,
    ) -> NotificationResult<()> {
        let notification = Notification::new(NotificationEvent::CollectionSummary {
            date: date.to_string(),
            total,
            success,
            from_snapshot,
            failed: total.saturating_sub(success),
            details,
        });

        self.notify(&notification).await
    }

    /// 시스템 오류 알림을 전송합니다.
    pub async fn notify_system_error(
        &self,
        error_code: &str,
        message: &str,
    ) -> NotificationResult<()> {
        let notification = Notification::new(NotificationEvent::SystemError {
            error_code: error_code.to_string(),
            message: message.to_string(),
        })
        .with_priority(NotificationPriority::Critical);

        self.notify(&notification).await
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use valuation_core::{BondYield, IndexConfig, InstrumentRecord, MetricField, MetricPoint};

    fn sender() -> DingTalkSender {
        DingTalkSender::new(DingTalkConfig::new(
            "https://oapi.dingtalk.com/robot/send?access_token=test",
        ))
        .unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn report(source: DataSource) -> ValuationReport {
        let history = vec![
            MetricPoint::new(date(5))
                .with_field(MetricField::PeRatio1, Some(dec!(6.81)))
                .with_field(MetricField::DividendYield2, Some(dec!(5.3))),
            MetricPoint::new(date(4))
                .with_field(MetricField::PeRatio1, Some(dec!(6.7)))
                .with_field(MetricField::DividendYield2, Some(dec!(5.0))),
        ];
        let record = InstrumentRecord::from_history("H30269", source, history).unwrap();
        ValuationReport::build(&IndexConfig::new("红利低波指数", "H30269"), &record, date(8), 15)
    }

    #[test]
    fn test_format_report_contains_metrics() {
        let message = sender().format_message(&Notification::report(report(DataSource::Excel)));

        assert!(message.title.contains("红利低波指数"));
        assert!(message.title.contains("H30269"));
        assert!(message.text.contains("P/E1: **6.81**"));
        assert!(message.text.contains("배당수익률2: **5.3000%**"));
        assert!(message.text.contains("15일 평균: **5.1500%**"));
        assert!(message.text.contains("전일 대비: **+6.00%**"));
        assert!(message.text.contains("데이터 출처: 지표 파일"));
    }

    #[test]
    fn test_format_report_with_bond_spread() {
        let bond = BondYield {
            as_of_date: date(5),
            yield_10y: dec!(2.52),
            change: Some(dec!(-0.03)),
        };
        let with_bond = report(DataSource::Excel).with_bond_yield(Some(bond));
        let message = sender().format_message(&Notification::report(with_bond));

        assert!(message.text.contains("10년 국채: **2.52%** (변화 -0.03%p)"));
        assert!(message.text.contains("배당-국채 스프레드: **+2.78%p**\n\n🎯"));

        let without = sender().format_message(&Notification::report(report(DataSource::Excel)));
        assert!(!without.text.contains("10년 국채"));
        assert!(without.text.contains("P/E 백분위: **100.0%**\n\n🎯"));
    }

    #[test]
    fn test_format_report_renders_absent_as_na() {
        let message = sender().format_message(&Notification::report(report(DataSource::Excel)));

        assert!(message.text.contains("P/E2: **N/A**"));
        assert!(message.text.contains("배당수익률1: **N/A%**"));
    }

    #[test]
    fn test_format_snapshot_report_shows_staleness() {
        let notification = Notification::report(report(DataSource::Snapshot));
        assert_eq!(notification.priority, NotificationPriority::High);

        let message = sender().format_message(&notification);
        assert!(message.text.contains("스냅샷 (실시간 수집 실패, 3일 경과)"));
    }

    #[test]
    fn test_format_data_unavailable() {
        let notification = Notification::new(NotificationEvent::DataUnavailable {
            index_name: "红利低波100指数".to_string(),
            index_code: "930955".to_string(),
            reason: "EXCEL 소스 재시도 소진 (3회): HTTP 503".to_string(),
        });

        let message = sender().format_message(&notification);
        assert!(message.title.contains("데이터 수집 실패"));
        assert!(message.text.contains("930955"));
        assert!(message.text.contains("HTTP 503"));
    }

    #[test]
    fn test_format_summary() {
        let notification = Notification::new(NotificationEvent::CollectionSummary {
            date: "2024-01-08".to_string(),
            total: 2,
            success: 1,
            from_snapshot: 0,
            failed: 1,
            details: vec!["✅ H30269".to_string(), "❌ 930955".to_string()],
        });

        let message = sender().format_message(&notification);
        assert!(message.text.contains("전체: 2건"));
        assert!(message.text.contains("- ❌ 930955"));
    }

    #[test]
    fn test_disabled_sender() {
        let mut config = DingTalkConfig::new("https://example.com/hook");
        config.enabled = false;
        assert!(!DingTalkSender::new(config).unwrap().is_enabled());
        assert!(!DingTalkSender::new(DingTalkConfig::new("")).unwrap().is_enabled());
    }

    #[test]
    fn test_config_debug_redacts_webhook() {
        let config = DingTalkConfig::new("https://oapi.dingtalk.com/robot/send?access_token=secret-token");
        assert!(!format!("{:?}", config).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_send_markdown_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/robot/send")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"msgtype":"markdown"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
            .create_async()
            .await;

        let sender =
            DingTalkSender::new(DingTalkConfig::new(format!("{}/robot/send", server.url()))).unwrap();
        sender
            .send(&Notification::report(report(DataSource::Api)))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_errcode_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/robot/send")
            .with_status(200)
            .with_body(r#"{"errcode":310000,"errmsg":"keywords not in content"}"#)
            .create_async()
            .await;

        let sender =
            DingTalkSender::new(DingTalkConfig::new(format!("{}/robot/send", server.url()))).unwrap();
        let err = sender.send_text("hello").await.unwrap_err();

        assert!(matches!(err, NotificationError::SendFailed(msg) if msg.contains("310000")));
    }

    #[tokio::test]
    async fn test_send_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/robot/send")
            .with_status(200)
            .with_body(r#"{"errcode":130101,"errmsg":"send too fast"}"#)
            .create_async()
            .await;

        let sender =
            DingTalkSender::new(DingTalkConfig::new(format!("{}/robot/send", server.url()))).unwrap();
        let err = sender.test_connection().await.unwrap_err();

        assert!(matches!(err, NotificationError::RateLimited(60)));
    }

    #[tokio::test]
    async fn test_manager_reports_failure_when_all_senders_fail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/robot/send")
            .with_status(500)
            .create_async()
            .await;

        let mut manager = NotificationManager::new();
        manager.add_sender(
            DingTalkSender::new(DingTalkConfig::new(format!("{}/robot/send", server.url()))).unwrap(),
        );

        assert_eq!(manager.enabled_count(), 1);
        assert!(manager
            .notify_data_unavailable("红利低波指数", "H30269", "timeout")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_manager_without_senders_is_noop() {
        let manager = NotificationManager::default();
        assert!(manager.notify_system_error("E001", "test").await.is_ok());
    }
}
