//! 지표 조회 JSON API 어댑터 (보조 소스).
//!
//! `GET {base_url}?indexCode={code}` 응답 형식:
//!
//! ```json
//! {"code": "200", "msg": "success",
//!  "data": [{"tradeDate": "20240105", "indexCode": "H30269",
//!            "pe1": 6.81, "pe2": "6.79", "dp1": 5.12, "dp2": null}]}
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use valuation_core::{DataSource, InstrumentRecord, MetricField, MetricPoint};

use super::{date_from_number, fetch_body, parse_date_text, parse_decimal_text, SourceAdapter};
use crate::error::FetchFailure;

/// API 응답 본문.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    /// 문자열 "200" 또는 숫자 200
    code: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Vec<ApiRow>>,
}

/// API 응답의 일별 행.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRow {
    #[serde(default)]
    trade_date: Value,
    #[serde(default)]
    index_code: Option<String>,
    #[serde(default)]
    pe1: Value,
    #[serde(default)]
    pe2: Value,
    #[serde(default)]
    dp1: Value,
    #[serde(default)]
    dp2: Value,
}

/// 지표 조회 API 어댑터.
pub struct ApiSourceAdapter {
    client: Client,
    base_url: String,
}

impl ApiSourceAdapter {
    /// 새 어댑터를 생성합니다.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for ApiSourceAdapter {
    fn source(&self) -> DataSource {
        DataSource::Api
    }

    async fn fetch(&self, instrument_id: &str) -> Result<InstrumentRecord, FetchFailure> {
        debug!(index = instrument_id, url = %self.base_url, "지표 API 요청");

        let request = self
            .client
            .get(&self.base_url)
            .query(&[("indexCode", instrument_id)])
            .header(reqwest::header::ACCEPT, "application/json");
        let body = fetch_body(request).await?;

        let history = parse_response(instrument_id, &body)?;
        let record = InstrumentRecord::from_history(instrument_id, DataSource::Api, history)
            .ok_or_else(|| FetchFailure::new(format!("{} 데이터 행 없음", instrument_id)))?;

        info!(
            index = instrument_id,
            as_of = %record.as_of_date,
            rows = record.history.len(),
            "API 지표 수집 완료"
        );
        Ok(record)
    }
}

pub(crate) fn json_decimal(value: &Value) -> Option<rust_decimal::Decimal> {
    match value {
        // Number의 문자열 표현을 그대로 파싱해 f64 오차를 피함
        Value::Number(n) => parse_decimal_text(&n.to_string()),
        Value::String(s) => parse_decimal_text(s),
        _ => None,
    }
}

pub(crate) fn json_date(value: &Value) -> Option<chrono::NaiveDate> {
    match value {
        Value::String(s) => parse_date_text(s),
        Value::Number(n) => n.as_f64().and_then(date_from_number),
        _ => None,
    }
}

/// 응답 코드가 "200"(문자열 또는 숫자)인지 확인합니다.
pub(crate) fn ensure_ok_code(code: &Value, msg: Option<&str>) -> Result<(), FetchFailure> {
    let code = match code {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if code != "200" {
        return Err(FetchFailure::new(format!(
            "API 오류 응답: code={}, msg={}",
            code,
            msg.unwrap_or("")
        )));
    }
    Ok(())
}

/// API 응답 본문을 일별 지표 행으로 파싱합니다.
pub fn parse_response(instrument_id: &str, body: &[u8]) -> Result<Vec<MetricPoint>, FetchFailure> {
    let response: ApiResponse = serde_json::from_slice(body)
        .map_err(|e| FetchFailure::new(format!("API 응답 파싱 실패: {}", e)))?;

    ensure_ok_code(&response.code, response.msg.as_deref())?;

    let rows = response
        .data
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| FetchFailure::new(format!("API 응답에 {} 데이터 없음", instrument_id)))?;

    let points: Vec<MetricPoint> = rows
        .iter()
        .filter(|row| {
            row.index_code
                .as_deref()
                .map_or(true, |code| code.trim().eq_ignore_ascii_case(instrument_id))
        })
        .filter_map(|row| {
            let date = json_date(&row.trade_date)?;
            Some(
                MetricPoint::new(date)
                    .with_field(MetricField::PeRatio1, json_decimal(&row.pe1))
                    .with_field(MetricField::PeRatio2, json_decimal(&row.pe2))
                    .with_field(MetricField::DividendYield1, json_decimal(&row.dp1))
                    .with_field(MetricField::DividendYield2, json_decimal(&row.dp2)),
            )
        })
        .collect();

    if points.is_empty() {
        return Err(FetchFailure::new(format!(
            "API 응답에 {} 의 유효한 행 없음",
            instrument_id
        )));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_response_mixed_value_types() {
        let body = br#"{
            "code": "200",
            "msg": "success",
            "data": [
                {"tradeDate": "20240105", "indexCode": "H30269", "pe1": 6.81, "pe2": "6.79", "dp1": 5.12, "dp2": null},
                {"tradeDate": 20240104, "indexCode": "H30269", "pe1": "--", "pe2": 6.7, "dp1": "5.1", "dp2": 5.3}
            ]
        }"#;

        let points = parse_response("H30269", body).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(points[0].value(MetricField::PeRatio1), Some(dec!(6.81)));
        assert_eq!(points[0].value(MetricField::PeRatio2), Some(dec!(6.79)));
        assert_eq!(points[0].value(MetricField::DividendYield2), None);
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(points[1].value(MetricField::PeRatio1), None);
    }

    #[test]
    fn test_numeric_code_accepted() {
        let body = br#"{"code": 200, "data": [{"tradeDate": "2024-01-05", "pe1": 1}]}"#;
        let points = parse_response("930955", body).unwrap();
        assert_eq!(points[0].value(MetricField::PeRatio1), Some(dec!(1)));
        assert_eq!(points[0].value(MetricField::DividendYield1), None);
    }

    #[test]
    fn test_error_responses() {
        let cases: [&[u8]; 5] = [
            br#"{"code": "500", "msg": "internal error"}"#,
            br#"{"code": "200", "data": []}"#,
            br#"{"code": "200"}"#,
            br#"{"code": "200", "data": [{"tradeDate": "yesterday", "pe1": 1}]}"#,
            b"<html>not json</html>",
        ];

        for body in cases {
            assert!(parse_response("H30269", body).is_err());
        }
    }

    #[test]
    fn test_other_index_rows_skipped() {
        let body = br#"{"code": "200", "data": [{"tradeDate": "20240105", "indexCode": "930955", "pe1": 7}]}"#;
        let err = parse_response("H30269", body).unwrap_err();
        assert!(err.cause.contains("H30269"));
    }
}
