//! 지수별 리포트 파일 저장.
//!
//! `{output_dir}/{code}/{report_date}.md`에 Markdown 리포트를,
//! 같은 이름의 `.json`에 리포트 원본을 기록합니다. 같은 날 다시 실행하면
//! 덮어씁니다.

use std::path::{Path, PathBuf};

use valuation_analytics::{render_markdown, ValuationReport};

/// 리포트 파일을 저장하고 Markdown 파일 경로를 반환합니다.
pub async fn save_report(output_dir: &Path, report: &ValuationReport) -> std::io::Result<PathBuf> {
    let index_dir = output_dir.join(&report.index.code);
    tokio::fs::create_dir_all(&index_dir).await?;

    let stem = report.report_date.to_string();
    let markdown_path = index_dir.join(format!("{}.md", stem));
    tokio::fs::write(&markdown_path, render_markdown(report)).await?;

    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(index_dir.join(format!("{}.json", stem)), json).await?;

    tracing::debug!(path = %markdown_path.display(), "리포트 파일 저장");
    Ok(markdown_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use valuation_core::{DataSource, IndexConfig, InstrumentRecord};

    #[tokio::test]
    async fn test_save_report_writes_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let record = InstrumentRecord::new("H30269", date, DataSource::Excel);
        let report =
            ValuationReport::build(&IndexConfig::new("红利低波指数", "H30269"), &record, date, 15);

        let path = save_report(dir.path(), &report).await.unwrap();

        assert_eq!(path, dir.path().join("H30269").join("2024-01-08.md"));
        let markdown = std::fs::read_to_string(&path).unwrap();
        assert!(markdown.starts_with("# 红利低波指数 (H30269)"));

        let json = std::fs::read(dir.path().join("H30269").join("2024-01-08.json")).unwrap();
        let restored: ValuationReport = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored.as_of_date, date);

        // 같은 날 재실행은 덮어쓰기
        save_report(dir.path(), &report).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path().join("H30269")).unwrap().count(), 2);
    }
}
