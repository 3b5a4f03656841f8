//! Google Cloud Secret Manager 백엔드.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::{CredentialBundle, SecretsProvider};
use costfeed_core::ports::credentials::CredentialResolver;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::token::AccessTokenSource;
use super::{build_client, fetch_json, parse_secret_object, with_trailing_slash};

const DEFAULT_BASE_URL: &str = "https://secretmanager.googleapis.com/";

#[derive(Deserialize)]
struct AccessResponse {
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    data: Option<String>,
}

/// GCP Secret Manager 백엔드: 항상 최신 버전을 조회
pub struct GcpSecretManagerResolver {
    client: reqwest::Client,
    base_url: url::Url,
    project_id: String,
    token: AccessTokenSource,
}

impl GcpSecretManagerResolver {
    pub fn new(
        project_id: &str,
        token: AccessTokenSource,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let base_url = url::Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| CoreError::Internal(format!("기본 URL 파싱 실패: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            project_id: project_id.to_string(),
            token,
        })
    }

    /// API 기본 URL 교체
    pub fn with_base_url(mut self, base_url: url::Url) -> Self {
        self.base_url = with_trailing_slash(base_url);
        self
    }

    fn access_url(&self, bundle_id: &str) -> Result<url::Url, CoreError> {
        self.base_url
            .join(&format!(
                "v1/projects/{}/secrets/{bundle_id}/versions/latest:access",
                self.project_id
            ))
            .map_err(|e| CoreError::credential(bundle_id, format!("URL 생성 실패: {e}")))
    }
}

#[async_trait]
impl CredentialResolver for GcpSecretManagerResolver {
    async fn resolve(&self, bundle_id: &str) -> Result<CredentialBundle, CoreError> {
        debug!(
            "GCP Secret Manager에서 시크릿 조회: projects/{}/secrets/{bundle_id}",
            self.project_id
        );

        let url = self.access_url(bundle_id)?;
        let token = self
            .token
            .token(&self.client)
            .await
            .map_err(|e| CoreError::credential(bundle_id, format!("액세스 토큰 획득 실패: {e}")))?;

        let value = fetch_json(bundle_id, self.client.get(url).bearer_auth(token)).await?;
        let parsed: AccessResponse = serde_json::from_value(value)
            .map_err(|e| CoreError::credential(bundle_id, format!("응답 형식 오류: {e}")))?;
        let data = parsed
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| CoreError::credential(bundle_id, "payload.data 없음"))?;

        let decoded = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| CoreError::credential(bundle_id, format!("base64 디코딩 실패: {e}")))?;
        let text = String::from_utf8(decoded)
            .map_err(|e| CoreError::credential(bundle_id, format!("UTF-8 아님: {e}")))?;

        parse_secret_object(bundle_id, &text)
    }

    fn provider(&self) -> SecretsProvider {
        SecretsProvider::Gcp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn resolver(server: &mockito::ServerGuard) -> GcpSecretManagerResolver {
        GcpSecretManagerResolver::new(
            "my-project",
            AccessTokenSource::Static("gcp-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(url::Url::parse(&server.url()).unwrap())
    }

    #[test]
    fn access_url_targets_latest_version() {
        let r = GcpSecretManagerResolver::new(
            "p1",
            AccessTokenSource::Static(String::new()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            r.access_url("snowflake_secrets").unwrap().as_str(),
            "https://secretmanager.googleapis.com/v1/projects/p1/secrets/snowflake_secrets/versions/latest:access"
        );
    }

    #[tokio::test]
    async fn access_secret_version() {
        let mut server = mockito::Server::new_async().await;
        let data = STANDARD.encode(r#"{"external_api_key":"gcp-key"}"#);
        let mock = server
            .mock(
                "GET",
                "/v1/projects/my-project/secrets/cloudzero_telemetry_secrets/versions/latest:access",
            )
            .match_header("authorization", "Bearer gcp-token")
            .with_status(200)
            .with_body(format!(
                r#"{{"name":"projects/1/secrets/x/versions/3","payload":{{"data":"{data}"}}}}"#
            ))
            .create_async()
            .await;

        let bundle = resolver(&server)
            .resolve("cloudzero_telemetry_secrets")
            .await
            .unwrap();

        assert_eq!(bundle.get("external_api_key"), Some("gcp-key"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_base64_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"payload":{"data":"***"}}"#)
            .create_async()
            .await;

        let err = resolver(&server).resolve("s").await.unwrap_err();
        assert!(matches!(err, CoreError::CredentialResolution { .. }));
    }

    #[tokio::test]
    async fn not_found_is_resolution_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = resolver(&server).resolve("missing").await.unwrap_err();
        match err {
            CoreError::CredentialResolution { bundle_id, message } => {
                assert_eq!(bundle_id, "missing");
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
