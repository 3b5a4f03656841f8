//! 텔레메트리 레코드 모델.
//!
//! 비용 배분 수집 API(`/unit-cost/v1/telemetry`)의 와이어 계약과
//! 불변 레코드 타입을 정의한다.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;
use crate::json;

/// 수집 API 경로
pub const TELEMETRY_PATH: &str = "/unit-cost/v1/telemetry";

/// 차원 제약 (키 → 값 목록). 정렬된 맵으로 직렬화 순서가 고정된다.
pub type Filter = BTreeMap<String, Vec<String>>;

/// 단위 비용 집계 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 시간 단위
    Hourly,
    /// 일 단위
    Daily,
}

impl Granularity {
    /// 와이어 문자열 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 텔레메트리 레코드: 생성 후 변경되지 않는 값 타입
///
/// 생성은 [`TelemetryRecord::new`] 또는 행 변환(`models::row`)으로만 한다.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    granularity: Granularity,
    element_name: String,
    filter: Filter,
    telemetry_stream: String,
    value: f64,
    timestamp: DateTime<FixedOffset>,
}

impl TelemetryRecord {
    /// 검증 후 레코드 생성
    pub fn new(
        granularity: Granularity,
        element_name: impl Into<String>,
        filter: Filter,
        telemetry_stream: impl Into<String>,
        value: f64,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Self, CoreError> {
        let element_name = element_name.into();
        if element_name.trim().is_empty() {
            return Err(CoreError::validation("element_name", "비어 있음"));
        }

        let telemetry_stream = telemetry_stream.into();
        if telemetry_stream.trim().is_empty() {
            return Err(CoreError::validation("telemetry_stream", "비어 있음"));
        }

        if !value.is_finite() {
            return Err(CoreError::validation(
                "value",
                format!("유한한 숫자가 아님: {value}"),
            ));
        }

        Ok(Self {
            granularity,
            element_name,
            filter,
            telemetry_stream,
            value,
            timestamp,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn telemetry_stream(&self) -> &str {
        &self.telemetry_stream
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRecord::from(self).serialize(serializer)
    }
}

/// 와이어 레코드: 키 이름은 하이픈 표기
#[derive(Debug, Serialize)]
pub struct WireRecord<'a> {
    pub granularity: Granularity,
    #[serde(rename = "element-name")]
    pub element_name: &'a str,
    pub filter: &'a Filter,
    #[serde(rename = "telemetry-stream")]
    pub telemetry_stream: &'a str,
    pub value: f64,
    /// ISO-8601, UTC 오프셋 포함 (`+00:00` 형식)
    pub timestamp: String,
}

impl<'a> From<&'a TelemetryRecord> for WireRecord<'a> {
    fn from(record: &'a TelemetryRecord) -> Self {
        Self {
            granularity: record.granularity,
            element_name: &record.element_name,
            filter: &record.filter,
            telemetry_stream: &record.telemetry_stream,
            value: record.value,
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, false),
        }
    }
}

/// 수집 API 요청 본문 `{ "records": [...] }`
#[derive(Debug, Serialize)]
pub struct TelemetryPayload<'a> {
    pub records: Vec<WireRecord<'a>>,
}

impl<'a> TelemetryPayload<'a> {
    /// 레코드 순서를 그대로 유지한 페이로드 생성
    pub fn from_records(records: &'a [TelemetryRecord]) -> Self {
        Self {
            records: records.iter().map(WireRecord::from).collect(),
        }
    }

    /// 전송용 바이트로 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        json::dumps(self).map(String::into_bytes)
    }
}
