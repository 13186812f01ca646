//! 지표 레코드 도메인 타입.
//!
//! 하나의 지수에 대해 특정 기준일에 수집된 밸류에이션 지표를 표현합니다.
//! 지표 값은 `Option<Decimal>`로 저장되며, `None`은 "값 없음(결측)"을 뜻하고
//! 0과 구분됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 수집 대상 지표 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricField {
    /// 주가수익비율 1 (총주식수 기준) P/E1
    #[serde(rename = "pe_ratio_1")]
    PeRatio1,
    /// 주가수익비율 2 (계산용 주식수 기준) P/E2
    #[serde(rename = "pe_ratio_2")]
    PeRatio2,
    /// 배당수익률 1 (총주식수 기준) D/P1
    #[serde(rename = "dividend_yield_1")]
    DividendYield1,
    /// 배당수익률 2 (계산용 주식수 기준) D/P2
    #[serde(rename = "dividend_yield_2")]
    DividendYield2,
}

impl MetricField {
    /// 알려진 모든 지표 필드.
    pub const ALL: [MetricField; 4] = [
        MetricField::PeRatio1,
        MetricField::PeRatio2,
        MetricField::DividendYield1,
        MetricField::DividendYield2,
    ];

    /// 지표 이름 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeRatio1 => "pe_ratio_1",
            Self::PeRatio2 => "pe_ratio_2",
            Self::DividendYield1 => "dividend_yield_1",
            Self::DividendYield2 => "dividend_yield_2",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown metric field: {}", s))
    }
}

/// 지표 이름 → 값 매핑. 값이 `None`이면 결측입니다.
pub type MetricFields = BTreeMap<MetricField, Option<Decimal>>;

/// 모든 지표를 결측으로 채운 매핑을 생성합니다.
pub fn absent_fields() -> MetricFields {
    MetricField::ALL.iter().map(|&field| (field, None)).collect()
}

/// 데이터 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    /// 지수 지표 Excel 파일 (주 데이터 소스)
    Excel,
    /// 지표 조회 API (보조 데이터 소스)
    Api,
    /// 마지막으로 성공한 수집 결과
    Snapshot,
}

impl DataSource {
    /// 출처 이름 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excel => "EXCEL",
            Self::Api => "API",
            Self::Snapshot => "SNAPSHOT",
        }
    }

    /// 실시간 소스인지 여부 (스냅샷 제외).
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Snapshot)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 일별 지표 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// 기준일
    pub date: NaiveDate,
    /// 지표 값
    pub fields: MetricFields,
}

impl MetricPoint {
    /// 모든 지표가 결측인 행을 생성합니다.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fields: absent_fields(),
        }
    }

    /// 지표 값을 설정합니다.
    pub fn with_field(mut self, field: MetricField, value: Option<Decimal>) -> Self {
        self.fields.insert(field, value);
        self
    }

    /// 지표 값을 조회합니다 (결측이면 `None`).
    pub fn value(&self, field: MetricField) -> Option<Decimal> {
        self.fields.get(&field).copied().flatten()
    }
}

/// 한 지수의 특정 시점 수집 결과.
///
/// `history`는 소스가 전달한 일별 행을 최신순으로 담으며, `history[0]`이
/// `fields`와 `as_of_date`의 원본 행입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    /// 지수 코드
    pub instrument_id: String,
    /// 지표 기준일
    pub as_of_date: NaiveDate,
    /// 최신 지표 값
    pub fields: MetricFields,
    /// 데이터 출처
    pub source: DataSource,
    /// 일별 지표 이력 (최신순)
    #[serde(default)]
    pub history: Vec<MetricPoint>,
}

impl InstrumentRecord {
    /// 모든 지표가 결측인 레코드를 생성합니다.
    pub fn new(instrument_id: impl Into<String>, as_of_date: NaiveDate, source: DataSource) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            as_of_date,
            fields: absent_fields(),
            source,
            history: Vec::new(),
        }
    }

    /// 최신순 이력에서 레코드를 생성합니다. 이력이 비어 있으면 `None`.
    pub fn from_history(
        instrument_id: impl Into<String>,
        source: DataSource,
        mut history: Vec<MetricPoint>,
    ) -> Option<Self> {
        history.sort_by(|a, b| b.date.cmp(&a.date));
        let latest = history.first()?.clone();

        Some(Self {
            instrument_id: instrument_id.into(),
            as_of_date: latest.date,
            fields: latest.fields,
            source,
            history,
        })
    }

    /// 지표 값을 설정합니다.
    pub fn with_field(mut self, field: MetricField, value: Option<Decimal>) -> Self {
        self.fields.insert(field, value);
        self
    }

    /// 출처를 바꾼 레코드를 반환합니다.
    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    /// 지표 값을 조회합니다 (결측이면 `None`).
    pub fn value(&self, field: MetricField) -> Option<Decimal> {
        self.fields.get(&field).copied().flatten()
    }

    /// 지표가 결측인지 확인합니다.
    pub fn is_absent(&self, field: MetricField) -> bool {
        self.value(field).is_none()
    }

    /// 기준일로부터 경과한 일수.
    pub fn stale_days(&self, today: NaiveDate) -> i64 {
        (today - self.as_of_date).num_days().max(0)
    }
}

/// 10년 만기 국채 수익률 (배당수익률 스프레드 비교 기준).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondYield {
    /// 수익률 기준일
    pub as_of_date: NaiveDate,
    /// 10년 만기 수익률 (%)
    pub yield_10y: Decimal,
    /// 직전 기준일 대비 변화 (%p)
    pub change: Option<Decimal>,
}

impl BondYield {
    /// 배당수익률과 국채 수익률의 차이 (%p).
    pub fn spread(&self, dividend_yield: Decimal) -> Decimal {
        dividend_yield - self.yield_10y
    }
}
