//! 지수 지표 Excel 파일 어댑터.
//!
//! 中证指数 CDN에서 `{code}indicator.xls` 파일을 내려받아 일별 지표 행을
//! 추출합니다. 본문이 OLE2/ZIP 시그니처로 시작하면 calamine으로, 그 외에는
//! UTF-8 CSV로 파싱합니다.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use reqwest::Client;
use tracing::{debug, info};
use valuation_core::{DataSource, InstrumentRecord, MetricField, MetricPoint};

use super::{date_from_number, decimal_from_f64, fetch_body, parse_date_text, parse_decimal_text};
use super::SourceAdapter;
use crate::error::FetchFailure;

/// 기본 Excel 파일 경로 (코드별 `{code}indicator.xls`).
pub const DEFAULT_EXCEL_BASE_URL: &str =
    "https://oss-ch.csindex.com.cn/static/html/csindex/public/uploads/file/autofile/indicator";

const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// 헤더 행을 찾을 때 확인하는 최대 행 수.
const HEADER_SCAN_ROWS: usize = 10;

static EMPTY_CELL: SheetCell = SheetCell::Empty;

/// Excel/CSV 지표 파일 어댑터.
pub struct ExcelSourceAdapter {
    client: Client,
    base_url: String,
    /// 지수별로 지정된 파일 URL
    index_urls: HashMap<String, String>,
}

impl ExcelSourceAdapter {
    /// 새 어댑터를 생성합니다.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index_urls: HashMap::new(),
        }
    }

    /// 특정 지수의 파일 URL을 지정합니다.
    pub fn with_index_url(mut self, code: impl Into<String>, url: impl Into<String>) -> Self {
        self.index_urls.insert(code.into(), url.into());
        self
    }

    /// 지수의 파일 URL.
    pub fn url_for(&self, instrument_id: &str) -> String {
        self.index_urls
            .get(instrument_id)
            .cloned()
            .unwrap_or_else(|| format!("{}/{}indicator.xls", self.base_url, instrument_id))
    }
}

#[async_trait]
impl SourceAdapter for ExcelSourceAdapter {
    fn source(&self) -> DataSource {
        DataSource::Excel
    }

    async fn fetch(&self, instrument_id: &str) -> Result<InstrumentRecord, FetchFailure> {
        let url = self.url_for(instrument_id);
        debug!(index = instrument_id, url = %url, "Excel 지표 파일 요청");

        let body = fetch_body(self.client.get(&url)).await?;
        let rows = read_sheet(&body)?;
        let history = parse_table(instrument_id, &rows)?;

        let record = InstrumentRecord::from_history(instrument_id, DataSource::Excel, history)
            .ok_or_else(|| FetchFailure::new(format!("{} 데이터 행 없음", instrument_id)))?;

        info!(
            index = instrument_id,
            as_of = %record.as_of_date,
            rows = record.history.len(),
            "Excel 지표 수집 완료"
        );
        Ok(record)
    }
}

/// 시트 셀 값.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    /// 빈 셀
    Empty,
    /// 숫자 (날짜 셀은 일련번호)
    Number(f64),
    /// 텍스트
    Text(String),
}

impl SheetCell {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&Data> for SheetCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Self::Number(*i as f64),
            Data::Float(f) => Self::Number(*f),
            Data::String(s) => Self::Text(s.clone()),
            Data::Bool(b) => Self::Text(b.to_string()),
            Data::DateTime(dt) => Self::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Self::Text(s.clone()),
            Data::Error(_) | Data::Empty => Self::Empty,
        }
    }
}

/// 응답 본문을 셀 행렬로 읽습니다.
pub fn read_sheet(body: &[u8]) -> Result<Vec<Vec<SheetCell>>, FetchFailure> {
    if body.is_empty() {
        return Err(FetchFailure::new("빈 응답 본문"));
    }

    if body.starts_with(&OLE_MAGIC) || body.starts_with(&ZIP_MAGIC) {
        read_workbook(body)
    } else {
        read_csv(body)
    }
}

fn read_workbook(body: &[u8]) -> Result<Vec<Vec<SheetCell>>, FetchFailure> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(body.to_vec()))
        .map_err(|e| FetchFailure::new(format!("Excel 파일 열기 실패: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FetchFailure::new("Excel 파일에 시트가 없음"))?
        .map_err(|e| FetchFailure::new(format!("Excel 시트 읽기 실패: {}", e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(SheetCell::from).collect())
        .collect())
}

fn read_csv(body: &[u8]) -> Result<Vec<Vec<SheetCell>>, FetchFailure> {
    let text = std::str::from_utf8(body)
        .map_err(|e| FetchFailure::new(format!("CSV 인코딩 오류: {}", e)))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FetchFailure::new(format!("CSV 파싱 실패: {}", e)))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = field.trim();
                    if field.is_empty() {
                        SheetCell::Empty
                    } else {
                        SheetCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// 헤더 컬럼 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Code,
    Metric(MetricField),
}

/// 헤더 이름으로 컬럼 종류를 판별합니다.
fn classify_header(header: &str) -> Option<Column> {
    let name: String = header
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if name.is_empty() {
        return None;
    }

    if name.contains("指数代码") || name.contains("indexcode") {
        return Some(Column::Code);
    }

    const METRIC_KEYS: [(MetricField, [&str; 3]); 4] = [
        (MetricField::PeRatio1, ["p/e1", "市盈率1", "pe_ratio_1"]),
        (MetricField::PeRatio2, ["p/e2", "市盈率2", "pe_ratio_2"]),
        (MetricField::DividendYield1, ["d/p1", "股息率1", "dividend_yield_1"]),
        (MetricField::DividendYield2, ["d/p2", "股息率2", "dividend_yield_2"]),
    ];
    for (field, keys) in METRIC_KEYS {
        if keys.iter().any(|key| name.contains(key)) {
            return Some(Column::Metric(field));
        }
    }

    if name.contains("日期") || name.contains("date") {
        return Some(Column::Date);
    }
    None
}

/// 헤더 행 위치와 컬럼 매핑.
struct Layout {
    header_row: usize,
    date_col: usize,
    code_col: Option<usize>,
    metric_cols: Vec<(usize, MetricField)>,
}

fn find_layout(rows: &[Vec<SheetCell>]) -> Option<Layout> {
    rows.iter()
        .take(HEADER_SCAN_ROWS)
        .enumerate()
        .find_map(|(header_row, row)| {
            let mut date_col = None;
            let mut code_col = None;
            let mut metric_cols = Vec::new();

            for (col, cell) in row.iter().enumerate() {
                match cell.text().and_then(classify_header) {
                    Some(Column::Date) if date_col.is_none() => date_col = Some(col),
                    Some(Column::Code) if code_col.is_none() => code_col = Some(col),
                    Some(Column::Metric(field))
                        if !metric_cols.iter().any(|(_, f)| *f == field) =>
                    {
                        metric_cols.push((col, field))
                    }
                    _ => {}
                }
            }

            match date_col {
                Some(date_col) if !metric_cols.is_empty() => Some(Layout {
                    header_row,
                    date_col,
                    code_col,
                    metric_cols,
                }),
                _ => None,
            }
        })
}

fn cell_date(cell: &SheetCell) -> Option<chrono::NaiveDate> {
    match cell {
        SheetCell::Number(n) => date_from_number(*n),
        SheetCell::Text(s) => parse_date_text(s),
        SheetCell::Empty => None,
    }
}

fn cell_decimal(cell: &SheetCell) -> Option<rust_decimal::Decimal> {
    match cell {
        SheetCell::Number(n) => decimal_from_f64(*n),
        SheetCell::Text(s) => parse_decimal_text(s),
        SheetCell::Empty => None,
    }
}

fn cell_code(cell: &SheetCell) -> Option<String> {
    match cell {
        // 숫자로 저장된 코드는 앞자리 0이 사라지므로 6자리로 복원
        SheetCell::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Some(format!("{:06}", *n as u64)),
        SheetCell::Number(n) => Some(n.to_string()),
        SheetCell::Text(s) => Some(s.trim().to_string()),
        SheetCell::Empty => None,
    }
}

/// 셀 행렬에서 지정한 지수의 일별 지표 행을 추출합니다.
///
/// 코드 컬럼이 있으면 다른 지수의 행은 건너뜁니다. 날짜를 해석할 수 없는
/// 행도 건너뜁니다. 남는 행이 없으면 실패입니다.
pub fn parse_table(
    instrument_id: &str,
    rows: &[Vec<SheetCell>],
) -> Result<Vec<MetricPoint>, FetchFailure> {
    let layout = find_layout(rows)
        .ok_or_else(|| FetchFailure::new("지표 헤더를 찾을 수 없음 (날짜/지표 컬럼 없음)"))?;

    let mut points = Vec::new();
    let mut skipped = 0usize;

    for row in rows.iter().skip(layout.header_row + 1) {
        let cell = |col: usize| row.get(col).unwrap_or(&EMPTY_CELL);

        if let Some(code_col) = layout.code_col {
            match cell_code(cell(code_col)) {
                Some(code) if code.eq_ignore_ascii_case(instrument_id) => {}
                _ => continue,
            }
        }

        let Some(date) = cell_date(cell(layout.date_col)) else {
            skipped += 1;
            continue;
        };

        let point = layout
            .metric_cols
            .iter()
            .fold(MetricPoint::new(date), |point, &(col, field)| {
                point.with_field(field, cell_decimal(cell(col)))
            });
        points.push(point);
    }

    if skipped > 0 {
        debug!(index = instrument_id, skipped = skipped, "날짜 없는 행 건너뜀");
    }

    if points.is_empty() {
        return Err(FetchFailure::new(format!("{} 데이터 행 없음", instrument_id)));
    }
    Ok(points)
}
