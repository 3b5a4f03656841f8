//! 실행 결과 리포트.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::models::telemetry::TelemetryRecord;

/// 드라이런 샘플 최대 개수
pub const DRY_RUN_SAMPLE_SIZE: usize = 5;

/// 배치 전송 결과
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    /// 실행 식별자 (로그 상관관계용)
    pub run_id: Uuid,
    /// 텔레메트리 스트림 이름
    pub stream_name: String,
    /// 전송된 레코드 수
    pub records_sent: usize,
    /// 전송된 배치 수
    pub batches_sent: usize,
    /// 전체 HTTP 시도 횟수 (재시도 포함)
    pub attempts: u32,
    /// 소요 시간
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl DeliveryReport {
    /// 레코드 없음: 네트워크 호출 없이 성공
    pub fn empty(run_id: Uuid, stream_name: &str) -> Self {
        Self {
            run_id,
            stream_name: stream_name.to_string(),
            records_sent: 0,
            batches_sent: 0,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// 드라이런 요약 (전송하지 않음)
#[derive(Debug, Clone, Serialize)]
pub struct DryRunSummary {
    pub run_id: Uuid,
    /// 유효 레코드 수
    pub record_count: usize,
    /// 건너뛴 행 수
    pub skipped_rows: usize,
    /// 값 합계
    pub total_value: ValueTotal,
    /// 앞쪽 레코드 샘플
    pub sample: Vec<TelemetryRecord>,
}

impl DryRunSummary {
    pub fn new(run_id: Uuid, records: &[TelemetryRecord], skipped_rows: usize) -> Self {
        let total_value = ValueTotal::of(records);

        Self {
            run_id,
            record_count: records.len(),
            skipped_rows,
            total_value,
            sample: records.iter().take(DRY_RUN_SAMPLE_SIZE).cloned().collect(),
        }
    }
}

/// 레코드 값 합계
///
/// 10진 표현이 가능하면 정확한 합계, 범위를 넘으면 부동소수 근사치로 보고한다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueTotal {
    Exact(Decimal),
    Approximate(f64),
}

impl ValueTotal {
    pub fn of(records: &[TelemetryRecord]) -> Self {
        let exact = records.iter().try_fold(Decimal::ZERO, |acc, r| {
            Decimal::from_f64(r.value()).and_then(|v| acc.checked_add(v))
        });

        match exact {
            Some(total) => Self::Exact(total),
            None => {
                warn!("값 합계가 10진 표현 범위를 넘어 근사치로 보고");
                Self::Approximate(records.iter().map(TelemetryRecord::value).sum())
            }
        }
    }
}

impl fmt::Display for ValueTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(total) => write!(f, "{total}"),
            Self::Approximate(total) => write!(f, "~{total}"),
        }
    }
}

/// 한 번의 추출 실행 결과
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// 모든 배치 전송 완료
    Delivered(DeliveryReport),
    /// 드라이런: 수집 API 호출 없음
    DryRun(DryRunSummary),
    /// 유효 레코드 없음 (성공으로 취급)
    Empty {
        /// 건너뛴 행 수
        skipped_rows: usize,
    },
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
