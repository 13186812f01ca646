//! 재시도 정책.
//!
//! 실패할 수 있는 비동기 작업을 최대 `max_attempts`회 실행하며, 시도 사이에
//! `base_delay × backoff^(attempt-1)` 만큼 대기합니다. 재시도가 있는 정책은
//! 시도 사이에 최소 `MIN_RETRY_DELAY`를 둡니다.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::FetchFailure;

/// 시도 사이 최소 대기 시간.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);

/// 재시도 정책 (상태 없음, 여러 어댑터에서 재사용 가능).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (1 이상)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub base_delay: Duration,
    /// 대기 시간 증가 배수 (1.0 이상)
    pub backoff: f64,
}

impl RetryPolicy {
    /// 새 정책을 생성합니다. 시도 횟수는 최소 1, 배수는 최소 1.0으로 보정됩니다.
    ///
    /// 2회 이상 시도하는 정책의 대기 시간은 `MIN_RETRY_DELAY` 미만이 될 수 없습니다.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: f64) -> Self {
        let max_attempts = max_attempts.max(1);
        let base_delay = if max_attempts > 1 {
            base_delay.max(MIN_RETRY_DELAY)
        } else {
            base_delay
        };
        let backoff = if backoff.is_finite() && backoff >= 1.0 {
            backoff
        } else {
            1.0
        };
        Self {
            max_attempts,
            base_delay,
            backoff,
        }
    }

    /// Excel 소스 기본 정책: 3회, 2초, ×1.5.
    pub fn excel_default() -> Self {
        Self::new(3, Duration::from_secs(2), 1.5)
    }

    /// API 소스 기본 정책: 2회, 1초, ×1.0.
    pub fn api_default() -> Self {
        Self::new(2, Duration::from_secs(1), 1.0)
    }

    /// 재시도 없이 1회만 실행하는 정책.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// `attempt`번째 실패 후 다음 시도 전 대기 시간 (`attempt`는 1부터).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(MIN_RETRY_DELAY)
    }

    /// 작업을 정책에 따라 실행합니다.
    ///
    /// 어느 시도에서든 성공하면 즉시 반환하고, 모든 시도가 실패하면 마지막
    /// `FetchFailure`를 그대로 반환합니다.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, FetchFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchFailure>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(failure) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "수집 실패, 재시도 예정"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    error!(
                        operation = label,
                        attempts = attempt,
                        error = %failure,
                        "재시도 소진"
                    );
                    return Err(failure);
                }
            }
        }
    }
}
