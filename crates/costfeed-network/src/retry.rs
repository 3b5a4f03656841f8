//! 전송 재시도 정책.
//!
//! 재시도 대상 상태 코드, 횟수, 백오프 계수를 명시적 값으로 다룬다.
//! 전송 계층(reqwest)에는 재시도를 걸지 않는다.

use costfeed_core::error::CoreError;
use std::time::Duration;

/// 기본 추가 재시도 횟수
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// 재시도 대상 HTTP 상태 코드
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// 백오프 상한
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);

/// 배치 전송 재시도 정책
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 첫 시도 이후 추가 시도 횟수
    pub max_retries: u32,
    /// 지수 백오프 계수: 시도 k(0부터) 후 `backoff_factor * 2^k` 대기
    pub backoff_factor: Duration,
    /// 재시도 대상 상태 코드
    pub retryable_statuses: Vec<u16>,
    /// 단일 대기 상한
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: Duration::from_secs(1),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 백오프 계수 설정
    pub fn with_backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// 재시도 대상 상태 코드 교체
    pub fn with_retryable_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.retryable_statuses = statuses.into();
        self
    }

    /// 배치당 최대 시도 횟수
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 재시도 가능한 에러인지 판별
    ///
    /// 전송 계층 실패(연결 거부, 타임아웃)와 지정된 상태 코드만 재시도한다.
    pub fn is_retryable(&self, error: &CoreError) -> bool {
        match error {
            CoreError::Network(_) => true,
            CoreError::HttpStatus { status, .. } => self.retryable_statuses.contains(status),
            _ => false,
        }
    }

    /// 시도 `attempt`(0부터) 실패 후 다음 시도까지 대기 시간
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_factor
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
