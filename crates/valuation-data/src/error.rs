//! 데이터 수집 오류 타입.
//!
//! - `FetchFailure`: 한 소스에 대한 1회 시도 실패 (재시도 대상)
//! - `SourceExhausted`: 한 소스의 재시도를 모두 소진
//! - `NoDataAvailable`: 모든 소스와 스냅샷이 실패 (호출자에게 전달되는 유일한 오류)
//! - `StoreError`: 스냅샷 저장소 I/O 오류 (파이프라인 내부에서 처리)

use std::fmt;

use thiserror::Error;
use valuation_core::DataSource;

/// 1회 수집 시도 실패.
///
/// 네트워크 오류, 타임아웃, 비정상 HTTP 상태, 응답 파싱 실패가 모두
/// 사람이 읽을 수 있는 원인 문자열과 함께 이 타입으로 정규화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct FetchFailure {
    /// 실패 원인
    pub cause: String,
}

impl FetchFailure {
    /// 새 실패를 생성합니다.
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// HTTP 요청 오류를 변환합니다.
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(format!("요청 타임아웃: {}", err))
        } else {
            Self::new(format!("네트워크 요청 실패: {}", err))
        }
    }
}

/// 한 소스에 대한 재시도 소진.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{data_source} 소스 재시도 소진 ({attempts}회): {last_cause}")]
pub struct SourceExhausted {
    /// 실패한 소스
    pub data_source: DataSource,
    /// 시도 횟수
    pub attempts: u32,
    /// 마지막 실패 원인
    pub last_cause: FetchFailure,
}

/// 모든 소스와 스냅샷이 실패한 최종 결과.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct NoDataAvailable {
    /// 지수 코드
    pub instrument_id: String,
    /// 소스별 실패 내역 (시도 순서)
    pub exhausted: Vec<SourceExhausted>,
}

impl fmt::Display for NoDataAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "사용 가능한 데이터 없음: {}", self.instrument_id)?;
        for failure in &self.exhausted {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

/// 스냅샷 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 파일 I/O 오류
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화/역직렬화 오류
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 파일 이름으로 쓸 수 없는 지수 코드
    #[error("Invalid snapshot key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_message_lists_tiers() {
        let err = NoDataAvailable {
            instrument_id: "H30269".to_string(),
            exhausted: vec![
                SourceExhausted {
                    data_source: DataSource::Excel,
                    attempts: 3,
                    last_cause: FetchFailure::new("HTTP 503"),
                },
                SourceExhausted {
                    data_source: DataSource::Api,
                    attempts: 2,
                    last_cause: FetchFailure::new("빈 응답"),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("사용 가능한 데이터 없음: H30269"));
        assert!(message.contains("EXCEL 소스 재시도 소진 (3회): HTTP 503"));
        assert!(message.contains("API 소스 재시도 소진 (2회): 빈 응답"));
    }
}
