//! 핵심 에러 타입.

use thiserror::Error;

/// 설정 및 카탈로그 관련 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 등록되지 않은 지수 코드
    #[error("지수 설정을 찾을 수 없음: {0}")]
    UnknownIndex(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
