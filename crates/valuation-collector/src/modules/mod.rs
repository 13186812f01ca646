//! 수집 작업 모듈.

pub mod report_file;
pub mod sources;
pub mod valuation_report;

pub use report_file::save_report;
pub use sources::{build_notifier, build_pipeline, fetch_configured_bond_yield};
pub use valuation_report::{
    run_valuation_reports, run_valuation_reports_with_options, ValuationReportOptions,
    ALL_INDEXES_FAILED,
};
