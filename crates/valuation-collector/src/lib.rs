//! 지수 밸류에이션 수집기.
//!
//! 이 crate는 cron 등 외부 트리거로 한 번씩 실행되는 바이너리를 제공합니다:
//! - 환경변수 기반 설정
//! - 지수별 지표 수집 (Excel → API → 스냅샷)
//! - 리포트 작성 및 DingTalk 알림 전송

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
