//! # costfeed-core
//!
//! costfeed 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 텔레메트리 레코드, 행 변환, 자격증명 번들, 전송 리포트
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`json`]: 확장 스칼라(Decimal, UUID, enum, 타임스탬프) JSON 직렬화 유틸리티

pub mod config;
pub mod error;
pub mod json;
pub mod models;
pub mod ports;
