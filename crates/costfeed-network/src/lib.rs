//! # costfeed-network
//!
//! HTTP 네트워크 어댑터.
//! 비용 배분 수집 API로의 텔레메트리 전송(배치 + 지수 백오프 재시도)과
//! 클라우드 시크릿 백엔드(AWS/Azure/GCP) 조회를 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use costfeed_network::batch_uploader::BatchDispatcher;
//! use costfeed_network::http_client::TelemetryHttpClient;
//! use costfeed_network::retry::RetryPolicy;
//! use costfeed_network::secrets::create_resolver;
//! ```

pub mod batch_uploader;
pub mod http_client;
pub mod retry;
pub mod secrets;
