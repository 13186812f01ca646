//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 지수 수
    pub total: usize,
    /// 리포트 작성 성공 (스냅샷 포함)
    pub success: usize,
    /// 스냅샷으로 대체된 지수 수
    pub from_snapshot: usize,
    /// 데이터 없음
    pub errors: usize,
    /// 알림 전송 성공
    pub sent: usize,
    /// 알림 전송 실패
    pub send_failed: usize,
    /// 저장된 리포트 파일 수
    pub reports_written: usize,
    /// 지수별 결과 한 줄 요약
    pub details: Vec<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 모든 지수가 실패했는지 여부
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.success == 0
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            from_snapshot = self.from_snapshot,
            errors = self.errors,
            sent = self.sent,
            send_failed = self.send_failed,
            reports_written = self.reports_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = CollectionStats::new();
        assert_eq!(stats.success_rate(), 0.0);
        assert!(!stats.all_failed());

        stats.total = 4;
        stats.success = 3;
        assert_eq!(stats.success_rate(), 75.0);

        stats.success = 0;
        assert!(stats.all_failed());
    }
}
