//! 배치 디스패처.
//!
//! 레코드 묶음을 순서를 유지한 채 `max_batch_size` 이하의 배치로 나누고,
//! 배치를 하나씩 순차 전송한다. 재시도 가능한 실패는 지수 백오프로 재시도하며,
//! 한 배치가 최종 실패하면 남은 배치는 보내지 않고 전체 전송을 중단한다.

use costfeed_core::error::CoreError;
use costfeed_core::models::report::DeliveryReport;
use costfeed_core::models::telemetry::TelemetryRecord;
use costfeed_core::ports::telemetry::{SerializedBatch, TelemetrySink};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::retry::RetryPolicy;

/// 입력 순서를 유지하는 배치 분할
///
/// 배치 경계는 `i`, `i + max_batch_size`이며 마지막 부분 배치도 포함된다.
pub fn partition<T>(items: &[T], max_batch_size: usize) -> Result<std::slice::Chunks<'_, T>, CoreError> {
    if max_batch_size == 0 {
        return Err(CoreError::Config("배치 크기는 1 이상이어야 함".to_string()));
    }
    Ok(items.chunks(max_batch_size))
}

/// 배치 디스패처: 순차 배치 전송 + 재시도
pub struct BatchDispatcher {
    sink: Arc<dyn TelemetrySink>,
    policy: RetryPolicy,
}

impl BatchDispatcher {
    /// 새 배치 디스패처 생성
    pub fn new(sink: Arc<dyn TelemetrySink>, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    /// 재시도 정책
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 전체 레코드 전송
    ///
    /// 빈 입력은 네트워크 호출 없이 0건 성공 리포트를 반환한다.
    pub async fn deliver(
        &self,
        records: &[TelemetryRecord],
        max_batch_size: usize,
        stream_name: &str,
    ) -> Result<DeliveryReport, CoreError> {
        let run_id = Uuid::new_v4();
        let batches = partition(records, max_batch_size)?;

        if records.is_empty() {
            warn!("전송할 텔레메트리 레코드 없음 (stream={stream_name})");
            return Ok(DeliveryReport::empty(run_id, stream_name));
        }

        let total_batches = records.len().div_ceil(max_batch_size);
        info!(
            "{}개 레코드를 {}개씩 {}개 배치로 전송 (stream={stream_name}, run={run_id})",
            records.len(),
            max_batch_size,
            total_batches
        );

        let started = Instant::now();
        let mut attempts = 0;

        for (i, chunk) in batches.enumerate() {
            let batch = SerializedBatch::encode(i + 1, chunk)?;
            info!(
                "배치 {}/{} 전송 ({}개 레코드)",
                batch.index, total_batches, batch.record_count
            );
            attempts += self.deliver_batch(&batch, total_batches).await?;
        }

        let elapsed = started.elapsed();
        info!(
            "전체 {}개 레코드, {}개 배치 전송 완료 ({:.2}s, 시도 {attempts}회)",
            records.len(),
            total_batches,
            elapsed.as_secs_f64()
        );

        Ok(DeliveryReport {
            run_id,
            stream_name: stream_name.to_string(),
            records_sent: records.len(),
            batches_sent: total_batches,
            attempts,
            elapsed,
        })
    }

    /// 배치 하나를 재시도 정책에 따라 전송. 성공 시 사용한 시도 횟수를 반환한다.
    async fn deliver_batch(&self, batch: &SerializedBatch, total: usize) -> Result<u32, CoreError> {
        let started = Instant::now();

        for attempt in 0..=self.policy.max_retries {
            let err = match self.sink.send(batch).await {
                Ok(()) => {
                    info!(
                        "배치 {}/{} 전송 성공: {}개 레코드, {:.2}s",
                        batch.index,
                        total,
                        batch.record_count,
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(attempt + 1);
                }
                Err(e) => e,
            };

            let retryable = self.policy.is_retryable(&err);
            if retryable && attempt < self.policy.max_retries {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    "배치 {}/{} 전송 실패 (시도 {}/{}): {err}, {delay:?} 후 재시도",
                    batch.index,
                    total,
                    attempt + 1,
                    self.policy.max_attempts()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let message = if retryable {
                format!("재시도 {}회 소진: {err}", self.policy.max_retries)
            } else {
                format!("영구 실패: {err}")
            };
            error!(
                "배치 {}/{} 최종 실패 ({:.2}s 경과): {message}",
                batch.index,
                total,
                started.elapsed().as_secs_f64()
            );
            return Err(CoreError::Delivery {
                batch: batch.index,
                attempts: attempt + 1,
                status: err.status(),
                message,
            });
        }

        Err(CoreError::Internal("재시도 루프 종료".to_string()))
    }
}
