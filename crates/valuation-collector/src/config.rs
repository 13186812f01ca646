//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;
use valuation_core::IndexCatalog;
use valuation_data::provider::excel::DEFAULT_EXCEL_BASE_URL;
use valuation_data::RetryPolicy;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// Excel 소스 설정
    pub excel: ExcelSourceConfig,
    /// API 소스 설정
    pub api: ApiSourceConfig,
    /// 국채 수익률 소스 설정
    pub bond: BondSourceConfig,
    /// 스냅샷 디렉토리
    pub snapshot_dir: PathBuf,
    /// 리포트 설정
    pub report: ReportConfig,
    /// 추적 대상 지수
    pub indexes: IndexCatalog,
}

/// 재시도 설정
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 (밀리초)
    pub delay_ms: u64,
    /// 대기 시간 배수
    pub backoff: f64,
}

/// Excel 소스 설정
#[derive(Debug, Clone)]
pub struct ExcelSourceConfig {
    /// 지표 파일 기본 URL (`{base_url}/{code}indicator.xls`)
    pub base_url: String,
    /// 재시도 설정
    pub retry: RetryConfig,
}

/// API 소스 설정
#[derive(Debug, Clone)]
pub struct ApiSourceConfig {
    /// API URL (미설정 시 API 단계는 항상 실패)
    pub url: Option<String>,
    /// 재시도 설정
    pub retry: RetryConfig,
}

/// 국채 수익률 소스 설정
#[derive(Debug, Clone)]
pub struct BondSourceConfig {
    /// 수익률 URL (미설정 시 스프레드 없이 리포트 작성)
    pub url: Option<String>,
    /// 재시도 설정
    pub retry: RetryConfig,
}

/// 리포트 설정
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// 배당수익률 통계 기간 (일)
    pub window_days: usize,
    /// 수집 요약 알림 전송 여부
    pub send_summary: bool,
    /// 리포트 파일 디렉토리 (`{dir}/{code}/`, 미설정 시 파일 저장 안 함)
    pub output_dir: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            excel: ExcelSourceConfig {
                base_url: DEFAULT_EXCEL_BASE_URL.to_string(),
                retry: RetryConfig {
                    max_attempts: 3,
                    delay_ms: 2000,
                    backoff: 1.5,
                },
            },
            api: ApiSourceConfig {
                url: None,
                retry: RetryConfig {
                    max_attempts: 2,
                    delay_ms: 1000,
                    backoff: 1.0,
                },
            },
            bond: BondSourceConfig {
                url: None,
                retry: RetryConfig {
                    max_attempts: 3,
                    delay_ms: 2000,
                    backoff: 1.5,
                },
            },
            snapshot_dir: PathBuf::from("data/snapshots"),
            report: ReportConfig {
                window_days: valuation_analytics::DEFAULT_WINDOW,
                send_summary: false,
                output_dir: Some(PathBuf::from("reports")),
            },
            indexes: IndexCatalog::default(),
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            request_timeout_secs: env_var_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            excel: ExcelSourceConfig {
                base_url: env_var_string("EXCEL_BASE_URL").unwrap_or(defaults.excel.base_url),
                retry: RetryConfig::from_env("EXCEL", defaults.excel.retry),
            },
            api: ApiSourceConfig {
                url: env_var_string("VALUATION_API_URL"),
                retry: RetryConfig::from_env("API", defaults.api.retry),
            },
            bond: BondSourceConfig {
                url: env_var_string("BOND_YIELD_URL"),
                retry: RetryConfig::from_env("BOND", defaults.bond.retry),
            },
            snapshot_dir: env_var_string("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            report: ReportConfig {
                window_days: env_var_parse("REPORT_WINDOW_DAYS", defaults.report.window_days).max(1),
                send_summary: env_var_bool("SEND_SUMMARY", defaults.report.send_summary),
                output_dir: if env_var_bool("WRITE_REPORT_FILES", true) {
                    env_var_string("REPORT_DIR")
                        .map(PathBuf::from)
                        .or(defaults.report.output_dir)
                } else {
                    None
                },
            },
            indexes: load_indexes()?,
        })
    }

    /// HTTP 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RetryConfig {
    /// `{prefix}_RETRY_ATTEMPTS`, `{prefix}_RETRY_DELAY_MS`, `{prefix}_RETRY_BACKOFF`에서 로드
    fn from_env(prefix: &str, default: RetryConfig) -> Self {
        Self {
            max_attempts: env_var_parse(&format!("{}_RETRY_ATTEMPTS", prefix), default.max_attempts),
            delay_ms: env_var_parse(&format!("{}_RETRY_DELAY_MS", prefix), default.delay_ms),
            backoff: env_var_parse(&format!("{}_RETRY_BACKOFF", prefix), default.backoff),
        }
    }

    /// 재시도 정책으로 변환
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.delay_ms),
            self.backoff,
        )
    }
}

/// 지수 목록 로드.
///
/// `VALUATION_INDEXES`(`코드:이름,...`)가 우선이고, 다음으로
/// `VALUATION_INDEX_FILE`(TOML), 둘 다 없으면 기본 카탈로그를 사용합니다.
fn load_indexes() -> Result<IndexCatalog> {
    if let Some(list) = env_var_string("VALUATION_INDEXES") {
        return IndexCatalog::parse_list(&list).map_err(|e| {
            CollectorError::Config(format!("VALUATION_INDEXES 파싱 실패: {}", e))
        });
    }

    if let Some(path) = env_var_string("VALUATION_INDEX_FILE") {
        return Ok(IndexCatalog::from_toml_file(path)?);
    }

    Ok(IndexCatalog::default())
}

/// 환경변수에서 비어 있지 않은 문자열을 읽음
fn env_var_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
