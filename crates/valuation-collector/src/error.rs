//! 에러 타입 정의.

use std::fmt;

use valuation_core::CoreError;
use valuation_data::StoreError;
use valuation_notification::NotificationError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 설정 에러
    Config(String),
    /// 지수 카탈로그 에러
    Catalog(CoreError),
    /// 스냅샷 저장소 에러
    Store(StoreError),
    /// HTTP 클라이언트 생성 에러
    Http(reqwest::Error),
    /// 알림 에러
    Notification(NotificationError),
    /// 데이터 수집 에러
    DataSource(String),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Catalog(e) => write!(f, "Index catalog error: {}", e),
            Self::Store(e) => write!(f, "Snapshot store error: {}", e),
            Self::Http(e) => write!(f, "HTTP client error: {}", e),
            Self::Notification(e) => write!(f, "Notification error: {}", e),
            Self::DataSource(msg) => write!(f, "Data source error: {}", msg),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Catalog(err)
    }
}

impl From<StoreError> for CollectorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<NotificationError> for CollectorError {
    fn from(err: NotificationError) -> Self {
        Self::Notification(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
