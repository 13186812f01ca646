//! 배당수익률 기간 통계 및 P/E 백분위.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use valuation_core::{MetricField, MetricPoint};

/// 기본 통계 기간 (최근 15개 거래일).
pub const DEFAULT_WINDOW: usize = 15;

/// 최근 기간 배당수익률 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendStats {
    /// 최신 값의 기준일
    pub as_of_date: NaiveDate,
    /// 통계에 사용된 행 수
    pub sample_size: usize,
    /// 현재 배당수익률
    pub current: Decimal,
    /// 직전 배당수익률
    pub previous: Option<Decimal>,
    /// 기간 평균
    pub average: Decimal,
    /// 기간 최대
    pub max: Decimal,
    /// 기간 최소
    pub min: Decimal,
    /// 표본 표준편차 (n-1, 2개 미만이면 없음)
    pub std_dev: Option<Decimal>,
    /// 전일 대비 변화
    pub daily_change: Option<Decimal>,
    /// 전일 대비 변화율 (%)
    pub change_percent: Option<Decimal>,
    /// 기간 내 상대 위치 (0~100, 변동 없으면 50)
    pub percentile: Decimal,
}

/// 배당수익률 값. D/P2가 없으면 D/P1을 사용합니다.
fn dividend_value(point: &MetricPoint) -> Option<Decimal> {
    point
        .value(MetricField::DividendYield2)
        .or_else(|| point.value(MetricField::DividendYield1))
}

/// min-max 백분위. 범위가 0이면 50.
fn min_max_percentile(current: Decimal, min: Decimal, max: Decimal) -> Decimal {
    if max == min {
        dec!(50)
    } else {
        (current - min) / (max - min) * dec!(100)
    }
}

/// 최근 `window`개 배당수익률 (최신순). 배당수익률이 없는 행은 제외합니다.
pub fn dividend_series(points: &[MetricPoint], window: usize) -> Vec<(NaiveDate, Decimal)> {
    let mut series: Vec<(NaiveDate, Decimal)> = points
        .iter()
        .filter_map(|p| dividend_value(p).map(|v| (p.date, v)))
        .collect();
    series.sort_by(|a, b| b.0.cmp(&a.0));
    series.truncate(window.max(1));
    series
}

impl DividendStats {
    /// 일별 이력에서 최근 `window`개 배당수익률로 통계를 계산합니다.
    ///
    /// 배당수익률이 없는 행은 제외하며, 남는 값이 없으면 `None`입니다.
    pub fn from_history(points: &[MetricPoint], window: usize) -> Option<Self> {
        let series = dividend_series(points, window);

        let (as_of_date, current) = *series.first()?;
        let values: Vec<Decimal> = series.iter().map(|(_, v)| *v).collect();
        let n = Decimal::from(values.len());

        let average = values.iter().sum::<Decimal>() / n;
        let max = values.iter().copied().max()?;
        let min = values.iter().copied().min()?;

        let std_dev = if values.len() >= 2 {
            let variance = values
                .iter()
                .map(|&v| {
                    let diff = v - average;
                    diff * diff
                })
                .sum::<Decimal>()
                / (n - Decimal::ONE);

            // rust_decimal에는 sqrt가 없으므로 f64로 변환하여 계산
            variance
                .to_f64()
                .and_then(|v| Decimal::try_from(v.sqrt()).ok())
                .map(|d| d.round_dp(6))
        } else {
            None
        };

        let previous = values.get(1).copied();
        let daily_change = previous.map(|p| current - p);
        let change_percent = match (daily_change, previous) {
            (Some(change), Some(p)) if !p.is_zero() => Some(change / p * dec!(100)),
            (Some(_), Some(_)) => Some(Decimal::ZERO),
            _ => None,
        };

        Some(Self {
            as_of_date,
            sample_size: values.len(),
            current,
            previous,
            average,
            max,
            min,
            std_dev,
            daily_change,
            change_percent,
            percentile: min_max_percentile(current, min, max),
        })
    }
}

/// 현재 P/E의 전체 이력 내 min-max 백분위.
///
/// 현재 값은 최신 행의 P/E2, 없으면 P/E1입니다. 비교 계열은 P/E2, P/E1
/// 순서로 이력에 값이 하나라도 있는 첫 계열입니다. 현재 값도 범위에
/// 포함하므로 결과는 0~100입니다. 최신 행에 P/E가 없으면 `None`,
/// 범위가 0이면 50입니다.
pub fn pe_percentile(points: &[MetricPoint]) -> Option<Decimal> {
    const PE_FIELDS: [MetricField; 2] = [MetricField::PeRatio2, MetricField::PeRatio1];

    let latest = points.iter().max_by_key(|p| p.date)?;
    let current = PE_FIELDS.into_iter().find_map(|field| latest.value(field))?;

    let series = PE_FIELDS
        .into_iter()
        .find(|&field| points.iter().any(|p| p.value(field).is_some()))?;

    let values = points.iter().filter_map(|p| p.value(series));
    let (min, max) = values.fold((current, current), |(min, max), v| (min.min(v), max.max(v)));

    Some(min_max_percentile(current, min, max))
}
