//! 지수별 밸류에이션 리포트.
//!
//! 수집된 레코드에서 배당수익률 통계, P/E 백분위, 추세 해석을 묶어
//! 알림 메시지에 쓰이는 리포트를 만듭니다.

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;
use valuation_core::{
    BondYield, DataSource, IndexConfig, InstrumentRecord, MetricField, MetricPoint,
};

use crate::stats::{dividend_series, pe_percentile, DividendStats};

/// 기간 내 상대 수준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLevel {
    /// 백분위 70 초과
    High,
    /// 30 이상 70 이하
    Middle,
    /// 백분위 30 미만
    Low,
}

impl TrendLevel {
    /// 백분위로 수준을 판정합니다.
    pub fn from_percentile(percentile: Decimal) -> Self {
        if percentile > dec!(70) {
            Self::High
        } else if percentile < dec!(30) {
            Self::Low
        } else {
            Self::Middle
        }
    }

    /// 표시용 이름.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "과거 대비 높은 수준",
            Self::Middle => "과거 대비 중간 수준",
            Self::Low => "과거 대비 낮은 수준",
        }
    }
}

/// 추세 해석 문구.
pub fn trend_analysis(stats: Option<&DividendStats>, window: usize) -> String {
    let Some(stats) = stats else {
        return "데이터 부족으로 추세 분석 불가".to_string();
    };

    let position = match stats.current.cmp(&stats.average) {
        std::cmp::Ordering::Greater => "높음",
        std::cmp::Ordering::Less => "낮음",
        std::cmp::Ordering::Equal => "같음",
    };

    format!(
        "현재 배당수익률이 {}일 평균보다 {}, {}",
        window,
        position,
        TrendLevel::from_percentile(stats.percentile).label()
    )
}

/// 투자 참고 문구.
pub fn investment_advice(stats: Option<&DividendStats>) -> String {
    match stats.map(|s| TrendLevel::from_percentile(s.percentile)) {
        Some(TrendLevel::High) => "배당수익률이 과거 고점 구간, 적정 수준의 관심을 고려할 만함",
        Some(TrendLevel::Low) => "배당수익률이 과거 저점 구간, 배분 가치 있음",
        Some(TrendLevel::Middle) => "배당수익률이 합리적 구간, 시장 전반의 흐름을 지켜볼 것을 권장",
        None => "다른 기술 지표와 펀더멘털 분석을 함께 고려해 판단하시기 바랍니다",
    }
    .to_string()
}

/// 중국 본토 기준 오늘 날짜 (지수 기준일과 같은 시간대).
pub fn today_shanghai() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

/// 지수 하나에 대한 밸류에이션 리포트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationReport {
    /// 지수 설정
    pub index: IndexConfig,
    /// 지표 기준일
    pub as_of_date: NaiveDate,
    /// 리포트 작성일
    pub report_date: NaiveDate,
    /// 데이터 출처
    pub source: DataSource,
    /// 기준일로부터 경과 일수
    pub stale_days: i64,
    /// P/E1
    pub pe_ratio_1: Option<Decimal>,
    /// P/E2
    pub pe_ratio_2: Option<Decimal>,
    /// D/P1
    pub dividend_yield_1: Option<Decimal>,
    /// D/P2
    pub dividend_yield_2: Option<Decimal>,
    /// 통계 기간
    pub window: usize,
    /// 배당수익률 기간 통계
    pub dividend: Option<DividendStats>,
    /// 전체 이력 내 P/E 백분위
    pub pe_percentile: Option<Decimal>,
    /// 추세 해석
    pub trend: String,
    /// 투자 참고
    pub advice: String,
    /// 최근 배당수익률 (최신순, 통계 기간만큼)
    #[serde(default)]
    pub recent_dividend: Vec<(NaiveDate, Decimal)>,
    /// 10년 만기 국채 수익률
    #[serde(default)]
    pub bond_yield: Option<BondYield>,
    /// 현재 배당수익률 - 국채 수익률 (%p)
    #[serde(default)]
    pub dividend_bond_spread: Option<Decimal>,
}

impl ValuationReport {
    /// 레코드로부터 리포트를 작성합니다.
    ///
    /// 이력이 없는 레코드는 최신 값 한 행으로 통계를 계산합니다.
    pub fn build(
        index: &IndexConfig,
        record: &InstrumentRecord,
        today: NaiveDate,
        window: usize,
    ) -> Self {
        let fallback;
        let history: &[MetricPoint] = if record.history.is_empty() {
            fallback = [MetricPoint {
                date: record.as_of_date,
                fields: record.fields.clone(),
            }];
            &fallback
        } else {
            &record.history
        };

        let dividend = DividendStats::from_history(history, window);
        let pe_percentile = pe_percentile(history);

        debug!(
            index = %index.code,
            rows = history.len(),
            has_dividend = dividend.is_some(),
            "리포트 작성"
        );

        Self {
            index: index.clone(),
            as_of_date: record.as_of_date,
            report_date: today,
            source: record.source,
            stale_days: record.stale_days(today),
            pe_ratio_1: record.value(MetricField::PeRatio1),
            pe_ratio_2: record.value(MetricField::PeRatio2),
            dividend_yield_1: record.value(MetricField::DividendYield1),
            dividend_yield_2: record.value(MetricField::DividendYield2),
            window,
            trend: trend_analysis(dividend.as_ref(), window),
            advice: investment_advice(dividend.as_ref()),
            recent_dividend: dividend_series(history, window),
            dividend,
            pe_percentile,
            bond_yield: None,
            dividend_bond_spread: None,
        }
    }

    /// 국채 수익률과 배당 스프레드를 설정합니다.
    ///
    /// 배당수익률 통계가 없으면 스프레드는 `None`입니다.
    pub fn with_bond_yield(mut self, bond: Option<BondYield>) -> Self {
        self.dividend_bond_spread = match (&self.dividend, &bond) {
            (Some(dividend), Some(bond)) => Some(bond.spread(dividend.current)),
            _ => None,
        };
        self.bond_yield = bond;
        self
    }

    /// 스냅샷에서 작성된 리포트인지 여부.
    pub fn is_snapshot(&self) -> bool {
        !self.source.is_live()
    }
}
