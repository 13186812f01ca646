//! 데이터 소스 어댑터.
//!
//! - `excel`: 지수 지표 Excel/CSV 파일 (주 소스)
//! - `api`: 지표 조회 JSON API (보조 소스)
//! - `bond`: 10년 만기 국채 수익률 (선택)

pub mod api;
pub mod bond;
pub mod excel;

pub use api::ApiSourceAdapter;
pub use bond::{fetch_bond_yield, BondYieldSource, HttpBondYieldSource};
pub use excel::ExcelSourceAdapter;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, RequestBuilder};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use valuation_core::{DataSource, InstrumentRecord};

use crate::error::FetchFailure;

/// 브라우저와 동일한 User-Agent (일부 CDN이 기본 UA를 차단함).
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 데이터 소스 어댑터 trait.
///
/// 지수 코드를 받아 네트워크 조회 후 `InstrumentRecord`로 파싱합니다.
/// 모든 실패(네트워크, 타임아웃, HTTP 상태, 파싱)는 `FetchFailure`로 정규화됩니다.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// 이 어댑터의 데이터 출처.
    fn source(&self) -> DataSource;

    /// 지수 지표를 조회합니다.
    async fn fetch(&self, instrument_id: &str) -> Result<InstrumentRecord, FetchFailure>;
}

/// 타임아웃과 브라우저 User-Agent가 설정된 HTTP 클라이언트를 생성합니다.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()
}

/// 요청을 보내고 2xx 응답 본문을 반환합니다. 빈 본문은 실패입니다.
pub(crate) async fn fetch_body(request: RequestBuilder) -> Result<Vec<u8>, FetchFailure> {
    let response = request.send().await.map_err(FetchFailure::from_request)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::new(format!("HTTP 상태 오류: {}", status)));
    }

    let body = response.bytes().await.map_err(FetchFailure::from_request)?;
    if body.is_empty() {
        return Err(FetchFailure::new("빈 응답 본문"));
    }
    Ok(body.to_vec())
}

/// f64를 Decimal로 변환 후 소수점 4자리로 반올림. 유한하지 않은 값은 결측.
pub(crate) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(4))
}

/// 숫자 텍스트를 Decimal로 파싱합니다.
///
/// - "1,234.5" -> 1234.5
/// - "", "-", "--", "N/A", 숫자가 아닌 텍스트 -> 결측
pub(crate) fn parse_decimal_text(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() || text == "-" || text == "--" || text.eq_ignore_ascii_case("n/a") {
        return None;
    }

    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    if let Ok(value) = Decimal::from_str(&cleaned) {
        return Some(value);
    }
    if let Ok(value) = Decimal::from_scientific(&cleaned) {
        return Some(value.round_dp(4));
    }
    None
}

/// 날짜 텍스트를 파싱합니다 (`yyyymmdd`, `yyyy-mm-dd`, `yyyy/mm/dd`).
///
/// 시각이 붙어 있으면 (`2024-01-05 00:00:00`) 날짜 부분만 사용합니다.
pub(crate) fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let token = text.trim().split([' ', 'T']).next()?;
    if token.is_empty() {
        return None;
    }

    if token.len() == 8 && token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse::<f64>().ok().and_then(date_from_number);
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return Some(date);
        }
    }

    // 숫자형 문자열 ("20240105.0", "45296")
    token.parse::<f64>().ok().and_then(date_from_number)
}

/// 숫자 셀을 날짜로 해석합니다.
///
/// 8자리 정수는 `yyyymmdd`, 그 외 양수는 스프레드시트 일련번호
/// (1899-12-30 기준 경과 일수)로 취급합니다.
pub(crate) fn date_from_number(value: f64) -> Option<NaiveDate> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    if (10_000_000.0..100_000_000.0).contains(&value) && value.fract() == 0.0 {
        let n = value as u32;
        return NaiveDate::from_ymd_opt((n / 10_000) as i32, (n / 100) % 100, n % 100);
    }

    if value < 1_000_000.0 {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        return epoch.checked_add_days(Days::new(value.trunc() as u64));
    }

    None
}
