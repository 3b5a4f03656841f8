//! 텔레메트리 수집 API 클라이언트.
//!
//! `TelemetrySink` 포트 구현. 생성 시 API 키를 한 번 조회해 보관하고,
//! 요청마다 정확히 한 번만 전송한다 (재시도는 `BatchDispatcher` 담당).

use async_trait::async_trait;
use chrono::Utc;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::API_KEY_FIELD;
use costfeed_core::models::telemetry::{Filter, Granularity, TelemetryRecord};
use costfeed_core::ports::credentials::CredentialResolver;
use costfeed_core::ports::telemetry::{SerializedBatch, TelemetrySink};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 기본 요청 타임아웃
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_USER_AGENT: &str = concat!("costfeed/", env!("CARGO_PKG_VERSION"));

/// 수집 API 클라이언트: `TelemetrySink` 포트 구현
pub struct TelemetryHttpClient {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
}

impl TelemetryHttpClient {
    /// 자격증명 번들에서 API 키를 조회해 클라이언트 생성
    pub async fn connect(
        resolver: &dyn CredentialResolver,
        secrets_id: &str,
        endpoint: url::Url,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let bundle = resolver.resolve(secrets_id).await.map_err(|e| {
            error!("수집 API 키 조회 실패: {e}");
            e
        })?;
        let api_key = bundle.require(API_KEY_FIELD)?.to_string();
        debug!("수집 API 키 조회 성공 ({})", resolver.provider());

        Self::new(endpoint, api_key, timeout)
    }

    /// API 키를 직접 지정해 클라이언트 생성
    pub fn new(endpoint: url::Url, api_key: String, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// 수집 엔드포인트 URL
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// 최소 테스트 레코드 하나를 전송해 연결 확인
    pub async fn test_connection(&self) -> Result<(), CoreError> {
        let mut filter = Filter::new();
        filter.insert("test".to_string(), vec!["connection".to_string()]);
        let record = TelemetryRecord::new(
            Granularity::Hourly,
            "test-connection",
            filter,
            "test-stream",
            0.0,
            Utc::now().fixed_offset(),
        )?;

        let batch = SerializedBatch::encode(1, std::slice::from_ref(&record))?;
        self.send(&batch).await?;
        info!("수집 API 연결 테스트 성공");
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for TelemetryHttpClient {
    async fn send(&self, batch: &SerializedBatch) -> Result<(), CoreError> {
        debug!(
            "배치 {} 전송: {}개 레코드 → {}",
            batch.index, batch.record_count, self.endpoint
        );
        let started = Instant::now();

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(batch.body.clone())
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    "타임아웃"
                } else if e.is_connect() {
                    "연결 실패"
                } else {
                    "요청 실패"
                };
                CoreError::Network(format!(
                    "{kind} ({:.2}s 경과): {e}",
                    started.elapsed().as_secs_f64()
                ))
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(
                "배치 {} 전송 성공: {}개 레코드, {:.2}s",
                batch.index,
                batch.record_count,
                started.elapsed().as_secs_f64()
            );
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_else(|e| {
            tracing::warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use mockito::Matcher;

    fn endpoint(server: &mockito::ServerGuard) -> url::Url {
        url::Url::parse(&server.url())
            .unwrap()
            .join(costfeed_core::models::telemetry::TELEMETRY_PATH)
            .unwrap()
    }

    fn record() -> TelemetryRecord {
        let mut filter = Filter::new();
        filter.insert("custom:warehouse".to_string(), vec!["WH_A".to_string()]);
        TelemetryRecord::new(
            Granularity::Hourly,
            "user_a",
            filter,
            "stream-a",
            42.0,
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
                .unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_posts_wire_contract() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/unit-cost/v1/telemetry")
            .match_header("authorization", "secret-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "records": [{
                    "granularity": "hourly",
                    "element-name": "user_a",
                    "filter": {"custom:warehouse": ["WH_A"]},
                    "telemetry-stream": "stream-a",
                    "value": 42.0,
                    "timestamp": "2024-01-01T10:00:00+00:00"
                }]
            })))
            .with_status(200)
            .create_async()
            .await;

        let client =
            TelemetryHttpClient::new(endpoint(&server), "secret-key".to_string(), DEFAULT_TIMEOUT)
                .unwrap();
        let batch = SerializedBatch::encode(1, &[record()]).unwrap();

        assert!(client.send(&batch).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_returns_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/unit-cost/v1/telemetry")
            .with_status(400)
            .with_body("bad granularity")
            .expect(1)
            .create_async()
            .await;

        let client =
            TelemetryHttpClient::new(endpoint(&server), "k".to_string(), DEFAULT_TIMEOUT).unwrap();
        let batch = SerializedBatch::encode(1, &[record()]).unwrap();

        let err = client.send(&batch).await.unwrap_err();
        match err {
            CoreError::HttpStatus { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad granularity");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        // 바인딩되지 않은 포트
        let endpoint = url::Url::parse("http://127.0.0.1:9/unit-cost/v1/telemetry").unwrap();
        let client =
            TelemetryHttpClient::new(endpoint, "k".to_string(), Duration::from_secs(2)).unwrap();
        let batch = SerializedBatch::encode(1, &[record()]).unwrap();

        let err = client.send(&batch).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn test_connection_sends_probe_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/unit-cost/v1/telemetry")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""element-name":"test-connection""#.to_string()),
                Matcher::Regex(r#""filter":\{"test":\["connection"\]\}"#.to_string()),
                Matcher::Regex(r#""telemetry-stream":"test-stream""#.to_string()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let client =
            TelemetryHttpClient::new(endpoint(&server), "k".to_string(), DEFAULT_TIMEOUT).unwrap();
        assert!(client.test_connection().await.is_ok());
        mock.assert_async().await;
    }
}
