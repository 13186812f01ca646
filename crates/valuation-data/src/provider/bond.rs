//! 10년 만기 국채 수익률 소스 (선택).
//!
//! 배당수익률과 비교할 기준 금리를 가져옵니다. 수집에 실패해도 리포트는
//! 스프레드 없이 작성됩니다.
//!
//! `GET {url}` 응답 형식:
//!
//! ```json
//! {"code": "200",
//!  "data": [{"date": "20240105", "curve": "中债国债收益率曲线", "yield10y": 2.52},
//!           {"date": "20240104", "curve": "中债国债收益率曲线", "yield10y": 2.55}]}
//! ```
//!
//! 행 키로 `日期`, `曲线名称`, `10年`도 받습니다. `curve`가 있는 행은
//! 国债 곡선만 사용합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use valuation_core::BondYield;

use super::api::{ensure_ok_code, json_date, json_decimal};
use super::fetch_body;
use crate::error::FetchFailure;
use crate::retry::RetryPolicy;

/// 국채 곡선 이름에 포함되는 키워드.
const TREASURY_CURVE_KEYWORD: &str = "国债";

/// 국채 수익률 소스 trait.
#[async_trait]
pub trait BondYieldSource: Send + Sync {
    /// 최신 10년 만기 수익률을 조회합니다.
    async fn fetch_latest(&self) -> Result<BondYield, FetchFailure>;
}

#[derive(Debug, Deserialize)]
struct BondResponse {
    code: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Vec<BondRow>>,
}

#[derive(Debug, Deserialize)]
struct BondRow {
    #[serde(default, alias = "日期")]
    date: Value,
    #[serde(default, alias = "曲线名称")]
    curve: Option<String>,
    #[serde(default, rename = "yield10y", alias = "10年")]
    yield_10y: Value,
}

/// HTTP JSON 국채 수익률 소스.
pub struct HttpBondYieldSource {
    client: Client,
    url: String,
}

impl HttpBondYieldSource {
    /// 새 소스를 생성합니다.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl BondYieldSource for HttpBondYieldSource {
    async fn fetch_latest(&self) -> Result<BondYield, FetchFailure> {
        debug!(url = %self.url, "국채 수익률 요청");

        let request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json");
        let body = fetch_body(request).await?;
        let bond = parse_bond_response(&body)?;

        info!(
            as_of = %bond.as_of_date,
            yield_10y = %bond.yield_10y,
            change = ?bond.change,
            "국채 수익률 수집 완료"
        );
        Ok(bond)
    }
}

/// 응답 본문에서 최신 10년 만기 수익률과 직전 대비 변화를 추출합니다.
pub fn parse_bond_response(body: &[u8]) -> Result<BondYield, FetchFailure> {
    let response: BondResponse = serde_json::from_slice(body)
        .map_err(|e| FetchFailure::new(format!("국채 수익률 응답 파싱 실패: {}", e)))?;
    ensure_ok_code(&response.code, response.msg.as_deref())?;

    let mut series: Vec<(NaiveDate, Decimal)> = response
        .data
        .unwrap_or_default()
        .iter()
        .filter(|row| {
            row.curve
                .as_deref()
                .map_or(true, |curve| curve.contains(TREASURY_CURVE_KEYWORD))
        })
        .filter_map(|row| Some((json_date(&row.date)?, json_decimal(&row.yield_10y)?)))
        .collect();
    series.sort_by(|a, b| b.0.cmp(&a.0));
    series.dedup_by_key(|(date, _)| *date);

    let (as_of_date, yield_10y) = *series
        .first()
        .ok_or_else(|| FetchFailure::new("국채 10년 수익률 행 없음"))?;

    Ok(BondYield {
        as_of_date,
        yield_10y,
        change: series.get(1).map(|&(_, previous)| yield_10y - previous),
    })
}

/// 재시도 후에도 실패하면 경고만 남기고 `None`을 반환합니다.
pub async fn fetch_bond_yield(
    source: &dyn BondYieldSource,
    policy: &RetryPolicy,
) -> Option<BondYield> {
    match policy.run("BOND", || source.fetch_latest()).await {
        Ok(bond) => Some(bond),
        Err(e) => {
            warn!(error = %e, "국채 수익률 수집 실패, 스프레드 없이 진행");
            None
        }
    }
}
