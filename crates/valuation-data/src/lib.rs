//! 밸류에이션 데이터 수집.
//!
//! 이 crate는 다음을 제공합니다:
//! - Excel 지표 파일 / 지표 API 소스 어댑터
//! - 국채 수익률 소스 (배당 스프레드용, 선택)
//! - 재시도 정책 (`RetryPolicy`)
//! - 마지막 성공 결과를 보관하는 스냅샷 저장소
//! - Excel → API → 스냅샷 순서의 폴백 파이프라인

pub mod error;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod snapshot;

pub use error::{FetchFailure, NoDataAvailable, SourceExhausted, StoreError};
pub use pipeline::FallbackPipeline;
pub use provider::{
    fetch_bond_yield, ApiSourceAdapter, BondYieldSource, ExcelSourceAdapter, HttpBondYieldSource,
    SourceAdapter,
};
pub use retry::{RetryPolicy, MIN_RETRY_DELAY};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
