//! 밸류에이션 분석.
//!
//! - `stats`: 배당수익률 기간 통계, P/E 백분위
//! - `report`: 추세 해석과 지수별 리포트
//! - `export`: 리포트 Markdown 렌더링

pub mod export;
pub mod report;
pub mod stats;

pub use export::render_markdown;
pub use report::{investment_advice, today_shanghai, trend_analysis, TrendLevel, ValuationReport};
pub use stats::{dividend_series, pe_percentile, DividendStats, DEFAULT_WINDOW};
