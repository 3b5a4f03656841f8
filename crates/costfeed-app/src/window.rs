//! 수집 시간 구간.
//!
//! 반개구간 `[start, end)`. 기본값은 데이터 지연을 고려한 직전 완결 시간대.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use costfeed_core::error::CoreError;
use costfeed_core::models::row::parse_offset_datetime;
use std::fmt;

/// 오프셋 없는 CLI 입력 형식 (UTC로 해석)
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// 수집 구간 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// 구간 생성: `start < end` 필수
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::Config(format!(
                "수집 구간 시작({start})이 끝({end})보다 앞서야 함"
            )));
        }
        Ok(Self { start, end })
    }

    /// 기본 구간: `floor_hour(now) - (latency + 1)h`부터 1시간
    pub fn default_for(now: DateTime<Utc>, latency_hours: u32) -> Result<Self, CoreError> {
        let floored = now.timestamp() - now.timestamp().rem_euclid(3600);
        let current_hour = DateTime::from_timestamp(floored, 0)
            .ok_or_else(|| CoreError::Internal(format!("시각 범위 초과: {now}")))?;

        let start = current_hour - Duration::hours(i64::from(latency_hours) + 1);
        let end = start + Duration::hours(1);
        Self::new(start.fixed_offset(), end.fixed_offset())
    }

    /// CLI `--start` / `--end` 값으로 구간 생성
    pub fn from_cli(start: &str, end: &str) -> Result<Self, CoreError> {
        Self::new(parse_cli_datetime(start)?, parse_cli_datetime(end)?)
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    /// 반개구간 `[start, end)` 포함 여부 (시각 기준)
    pub fn contains(&self, ts: DateTime<FixedOffset>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// 쿼리 바인딩용 경계값 (UTC, RFC 3339)
    pub fn bounds(&self) -> [String; 2] {
        [self.start, self.end].map(|ts| {
            ts.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
        })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start, self.end)
    }
}

/// CLI 시각 파싱: 오프셋이 없으면 UTC
pub fn parse_cli_datetime(raw: &str) -> Result<DateTime<FixedOffset>, CoreError> {
    if let Some(ts) = parse_offset_datetime(raw) {
        return Ok(ts);
    }

    let raw = raw.trim();
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| CoreError::Config(format!("ISO 형식 시각이 아님: {raw}")))?;

    Ok(naive.and_utc().fixed_offset())
}
