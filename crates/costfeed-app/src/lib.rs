//! # costfeed-app
//!
//! 웨어하우스 뷰에서 사용량 메트릭을 추출해 수집 API로 전송하는 실행 계층.
//! 설정 로딩, 시간 구간 계산, 추출 오케스트레이션을 담당한다.

pub mod coordinator;
pub mod settings;
pub mod window;
