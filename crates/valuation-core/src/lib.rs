//! # Valuation Core
//!
//! 지수 밸류에이션 수집기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 지표 레코드 (`InstrumentRecord`) 및 지표 필드
//! - 데이터 출처 구분 (Excel / API / 스냅샷)
//! - 국채 수익률 (`BondYield`)
//! - 추적 대상 지수 설정 및 카탈로그
//! - 로깅 인프라

pub mod error;
pub mod index;
pub mod logging;
pub mod types;

pub use error::*;
pub use index::*;
pub use logging::*;
pub use types::*;
