//! 리포트 Markdown 렌더링.
//!
//! 지수별 리포트 파일 본문을 만듭니다. 최근 배당수익률 추이는 표 안의
//! 텍스트 막대 차트로 표시합니다.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::report::ValuationReport;

/// 차트 막대 최대 길이 (문자 수).
pub const CHART_WIDTH: usize = 20;

const BAR: char = '█';

fn value_or_dash(value: Option<Decimal>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v.round_dp(2).normalize(), suffix),
        None => "-".to_string(),
    }
}

fn signed(value: Option<Decimal>, suffix: &str) -> String {
    match value {
        Some(v) if v > Decimal::ZERO => format!("+{}{}", v.round_dp(2).normalize(), suffix),
        other => value_or_dash(other, suffix),
    }
}

/// 최소~최대 범위에서 값의 막대 길이. 범위가 0이면 절반 길이.
fn bar_len(value: Decimal, min: Decimal, max: Decimal) -> usize {
    if max == min {
        return CHART_WIDTH / 2;
    }
    let ratio = ((value - min) / (max - min)).to_f64().unwrap_or(0.0);
    1 + (ratio * (CHART_WIDTH - 1) as f64).round() as usize
}

/// 리포트를 Markdown 문서로 렌더링합니다.
pub fn render_markdown(report: &ValuationReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!(
        "# {} ({}) 밸류에이션 리포트\n\n",
        report.index.name, report.index.code
    ));

    md.push_str("| 항목 | 값 |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| 작성일 | {} |\n", report.report_date));
    md.push_str(&format!("| 기준일 | {} |\n", report.as_of_date));
    if report.is_snapshot() {
        md.push_str(&format!(
            "| 출처 | {} ({}일 경과) |\n",
            report.source, report.stale_days
        ));
    } else {
        md.push_str(&format!("| 출처 | {} |\n", report.source));
    }
    md.push('\n');

    md.push_str("## 밸류에이션 지표\n\n");
    md.push_str("| 지표 | 값 |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| P/E1 | {} |\n", value_or_dash(report.pe_ratio_1, "")));
    md.push_str(&format!("| P/E2 | {} |\n", value_or_dash(report.pe_ratio_2, "")));
    md.push_str(&format!("| D/P1 | {} |\n", value_or_dash(report.dividend_yield_1, "%")));
    md.push_str(&format!("| D/P2 | {} |\n", value_or_dash(report.dividend_yield_2, "%")));
    md.push_str(&format!(
        "| P/E 백분위 | {} |\n",
        value_or_dash(report.pe_percentile, "%")
    ));
    md.push('\n');

    if let Some(d) = &report.dividend {
        md.push_str(&format!("## 배당수익률 통계 (최근 {}일)\n\n", report.window));
        md.push_str("| 항목 | 값 |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| 현재 | {} |\n", value_or_dash(Some(d.current), "%")));
        md.push_str(&format!("| 평균 | {} |\n", value_or_dash(Some(d.average), "%")));
        md.push_str(&format!("| 최대 | {} |\n", value_or_dash(Some(d.max), "%")));
        md.push_str(&format!("| 최소 | {} |\n", value_or_dash(Some(d.min), "%")));
        md.push_str(&format!("| 표준편차 | {} |\n", value_or_dash(d.std_dev, "")));
        md.push_str(&format!(
            "| 전일 대비 | {} ({}) |\n",
            signed(d.daily_change, "%p"),
            signed(d.change_percent, "%")
        ));
        md.push_str(&format!("| 기간 백분위 | {} |\n", value_or_dash(Some(d.percentile), "%")));
        md.push('\n');
    }

    if let Some(bond) = &report.bond_yield {
        md.push_str("## 국채 수익률 비교\n\n");
        md.push_str("| 항목 | 값 |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!(
            "| 10년 국채 ({}) | {} |\n",
            bond.as_of_date,
            value_or_dash(Some(bond.yield_10y), "%")
        ));
        md.push_str(&format!("| 국채 변화 | {} |\n", signed(bond.change, "%p")));
        md.push_str(&format!(
            "| 배당-국채 스프레드 | {} |\n",
            signed(report.dividend_bond_spread, "%p")
        ));
        md.push('\n');
    }

    if !report.recent_dividend.is_empty() {
        let values = report.recent_dividend.iter().map(|(_, v)| *v);
        let min = values.clone().min().unwrap_or_default();
        let max = values.max().unwrap_or_default();

        md.push_str(&format!(
            "## 배당수익률 추이 (최근 {}일)\n\n",
            report.recent_dividend.len()
        ));
        md.push_str("| 날짜 | 배당수익률 | 차트 |\n");
        md.push_str("| --- | --- | --- |\n");
        // 오래된 날짜부터
        for (date, value) in report.recent_dividend.iter().rev() {
            let bar: String = std::iter::repeat(BAR).take(bar_len(*value, min, max)).collect();
            md.push_str(&format!(
                "| {} | {} | `{}` |\n",
                date,
                value_or_dash(Some(*value), "%"),
                bar
            ));
        }
        md.push('\n');
    }

    md.push_str("## 분석\n\n");
    md.push_str(&format!("- 추세: {}\n", report.trend));
    md.push_str(&format!("- 참고: {}\n", report.advice));

    md
}
