//! costfeed 핵심 에러 타입.
//!
//! 어댑터 crate는 모두 이 타입을 그대로 반환한다. 바이너리 경계에서만
//! `anyhow`로 감싼다.

use thiserror::Error;

/// 코어 레이어 에러.
///
/// 행 검증, 설정, 자격증명 조회, 전송 실패를 구분한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 또는 자격증명 누락/오류 (재시도 없음)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 행 데이터 유효성 검증 실패 (해당 행만 건너뜀)
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 시크릿 백엔드 조회 실패 (네트워크, 시크릿 없음, 잘못된 페이로드)
    #[error("자격증명 조회 실패 ({bundle_id}): {message}")]
    CredentialResolution {
        /// 조회한 번들 식별자
        bundle_id: String,
        /// 실패 사유
        message: String,
    },

    /// 영구 전송 실패 또는 재시도 소진: 전체 전송 중단
    #[error("전송 실패 (배치 {batch}, 시도 {attempts}회, 상태 {}): {message}", .status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()))]
    Delivery {
        /// 실패한 배치 번호 (1부터)
        batch: usize,
        /// 해당 배치에 대한 총 시도 횟수
        attempts: u32,
        /// 마지막 HTTP 상태 코드 (전송 계층 실패면 None)
        status: Option<u16>,
        /// 마지막 실패 사유
        message: String,
    },

    /// 네트워크 에러 (연결 거부, 타임아웃, 연결 리셋)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 수집 API의 2xx 이외 응답 (단일 시도)
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// 응답 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// 웨어하우스 쿼리 실행 실패
    #[error("웨어하우스 에러: {0}")]
    Warehouse(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 필드 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 자격증명 조회 에러 생성 헬퍼
    pub fn credential(bundle_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CredentialResolution {
            bundle_id: bundle_id.into(),
            message: message.into(),
        }
    }

    /// 응답 상태 코드 (HTTP 계열 에러에서만)
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Delivery { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_display_includes_status() {
        let err = CoreError::Delivery {
            batch: 2,
            attempts: 4,
            status: Some(503),
            message: "Service Unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("배치 2"));
        assert!(msg.contains("503"));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn delivery_display_without_status() {
        let err = CoreError::Delivery {
            batch: 1,
            attempts: 1,
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("상태 -"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn validation_helper() {
        let err = CoreError::validation("element_name", "비어 있음");
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "element_name"));
    }
}
