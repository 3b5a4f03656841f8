//! costfeed 도메인 모델.
//!
//! 수집 API로 전송되는 텔레메트리 레코드와 그 주변 타입을 정의한다.

pub mod credentials;
pub mod report;
pub mod row;
pub mod telemetry;
