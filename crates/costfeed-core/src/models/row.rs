//! 웨어하우스 행 → 텔레메트리 레코드 변환.
//!
//! 행 단위 검증 실패는 이 경계에서 흡수된다. 호출자는 [`convert_rows`]가
//! 돌려주는 [`RowConversion`]에서 건너뛴 행 수를 확인할 수 있다.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::telemetry::{Filter, Granularity, TelemetryRecord};

/// 웨어하우스 쿼리 결과 한 행 (소문자 컬럼명 → 값)
pub type Row = Map<String, Value>;

/// 오프셋이 포함된 타임스탬프 형식 (RFC 3339 실패 시 순서대로 시도)
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// 행 하나를 레코드로 변환
///
/// 필수 컬럼: `element_name`, `timestamp`, `filter`, `value`.
pub fn to_record(
    row: &Row,
    granularity: Granularity,
    stream_name: &str,
) -> Result<TelemetryRecord, CoreError> {
    let element_name = parse_element_name(row.get("element_name"))?;
    let timestamp = parse_timestamp(row.get("timestamp"))?;
    let filter = parse_filter(row.get("filter"))?;
    let value = parse_value(row.get("value"))?;

    TelemetryRecord::new(
        granularity,
        element_name,
        filter,
        stream_name,
        value,
        timestamp,
    )
}

/// 건너뛴 행 정보
#[derive(Debug)]
pub struct SkippedRow {
    /// 입력 순서상 행 번호 (0부터)
    pub index: usize,
    /// 검증 실패 사유
    pub error: CoreError,
}

/// 행 묶음 변환 결과
#[derive(Debug, Default)]
pub struct RowConversion {
    /// 유효한 레코드 (입력 순서 유지)
    pub records: Vec<TelemetryRecord>,
    /// 검증 실패로 건너뛴 행
    pub skipped: Vec<SkippedRow>,
}

impl RowConversion {
    /// 건너뛴 행 수
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// 행 목록을 순서대로 변환. 실패한 행은 건너뛰고 계속한다.
pub fn convert_rows<'a, I>(rows: I, granularity: Granularity, stream_name: &str) -> RowConversion
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut conversion = RowConversion::default();

    for (index, row) in rows.into_iter().enumerate() {
        match to_record(row, granularity, stream_name) {
            Ok(record) => conversion.records.push(record),
            Err(error) => {
                warn!("잘못된 행 건너뜀 (#{index}): {error}");
                conversion.skipped.push(SkippedRow { index, error });
            }
        }
    }

    if conversion.skipped.is_empty() {
        debug!("행 변환 완료: {}개 레코드", conversion.records.len());
    } else {
        warn!(
            "행 변환 완료: {}개 레코드, {}개 행 건너뜀",
            conversion.records.len(),
            conversion.skipped.len()
        );
    }

    conversion
}

fn parse_element_name(value: Option<&Value>) -> Result<String, CoreError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(CoreError::validation("element_name", "비어 있음")),
        None | Some(Value::Null) => Err(CoreError::validation("element_name", "누락")),
        Some(other) => Err(CoreError::validation(
            "element_name",
            format!("문자열이 아님: {other}"),
        )),
    }
}

/// 오프셋이 포함된 타임스탬프 문자열 파싱
///
/// 오프셋이 없는(naive) 문자열은 거부한다.
pub fn parse_offset_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
}

fn parse_timestamp(value: Option<&Value>) -> Result<DateTime<FixedOffset>, CoreError> {
    match value {
        Some(Value::String(s)) => parse_offset_datetime(s).ok_or_else(|| {
            CoreError::validation(
                "timestamp",
                format!("오프셋 포함 ISO-8601 형식이 아님: {s:?}"),
            )
        }),
        None | Some(Value::Null) => Err(CoreError::validation("timestamp", "누락")),
        Some(other) => Err(CoreError::validation(
            "timestamp",
            format!("문자열이 아님: {other}"),
        )),
    }
}

fn parse_filter(value: Option<&Value>) -> Result<Filter, CoreError> {
    let object = match value {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(CoreError::validation(
                    "filter",
                    format!("JSON 객체가 아님: {other}"),
                ))
            }
            Err(e) => {
                return Err(CoreError::validation(
                    "filter",
                    format!("JSON 파싱 실패: {e}"),
                ))
            }
        },
        Some(Value::Object(map)) => map.clone(),
        None | Some(Value::Null) => return Err(CoreError::validation("filter", "누락")),
        Some(other) => {
            return Err(CoreError::validation(
                "filter",
                format!("JSON 객체가 아님: {other}"),
            ))
        }
    };

    object
        .into_iter()
        .map(|(key, values)| {
            let values = match values {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| filter_scalar(&key, item))
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![filter_scalar(&key, scalar)?],
            };
            Ok((key, values))
        })
        .collect()
}

fn filter_scalar(key: &str, value: Value) -> Result<String, CoreError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CoreError::validation(
            "filter",
            format!("{key}: 지원하지 않는 값 {other}"),
        )),
    }
}

fn parse_value(value: Option<&Value>) -> Result<f64, CoreError> {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| CoreError::validation("value", format!("f64 변환 불가: {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| CoreError::validation("value", format!("{s:?}: {e}"))),
        None | Some(Value::Null) => Err(CoreError::validation("value", "누락")),
        Some(other) => Err(CoreError::validation(
            "value",
            format!("숫자가 아님: {other}"),
        )),
    }
}
