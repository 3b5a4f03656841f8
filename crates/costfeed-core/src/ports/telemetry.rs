//! 텔레메트리 수집 전송 포트.
//!
//! 구현: `costfeed-network::http_client` (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::telemetry::{TelemetryPayload, TelemetryRecord};

/// 한 번 직렬화된 배치: 재시도 시 동일한 바이트를 재전송한다
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedBatch {
    /// 배치 번호 (1부터)
    pub index: usize,
    /// 포함된 레코드 수
    pub record_count: usize,
    /// JSON 본문
    pub body: Vec<u8>,
}

impl SerializedBatch {
    /// 레코드 슬라이스를 와이어 페이로드로 직렬화
    pub fn encode(index: usize, records: &[TelemetryRecord]) -> Result<Self, CoreError> {
        Ok(Self {
            index,
            record_count: records.len(),
            body: TelemetryPayload::from_records(records).to_bytes()?,
        })
    }
}

/// 수집 엔드포인트로의 단일 전송 시도
///
/// 재시도는 하지 않는다. 2xx 이외 응답은 `CoreError::HttpStatus`,
/// 전송 계층 실패는 `CoreError::Network`로 반환하며 분류는 호출자 몫이다.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, batch: &SerializedBatch) -> Result<(), CoreError>;
}
