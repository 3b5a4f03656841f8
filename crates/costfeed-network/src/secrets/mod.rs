//! 자격증명 백엔드.
//!
//! `CredentialResolver` 포트 구현체와 설정 기반 팩토리.
//! 프로세스당 백엔드는 하나만 활성화된다.

pub mod aws;
pub mod azure;
pub mod env;
pub mod gcp;
pub mod token;

use costfeed_core::config::AppConfig;
use costfeed_core::error::CoreError;
use costfeed_core::json;
use costfeed_core::models::credentials::{CredentialBundle, SecretsProvider};
use costfeed_core::ports::credentials::CredentialResolver;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub use aws::{AwsCredentials, AwsSecretsResolver};
pub use azure::AzureKeyVaultResolver;
pub use env::EnvCredentialResolver;
pub use gcp::GcpSecretManagerResolver;
pub use token::AccessTokenSource;

/// 프로세스 환경 변수로 백엔드 생성
pub fn create_resolver(config: &AppConfig) -> Result<Arc<dyn CredentialResolver>, CoreError> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    create_resolver_with_env(config, &vars)
}

/// 주어진 환경 스냅샷으로 백엔드 생성
pub fn create_resolver_with_env(
    config: &AppConfig,
    vars: &HashMap<String, String>,
) -> Result<Arc<dyn CredentialResolver>, CoreError> {
    let timeout = config.request_timeout();
    let resolver: Arc<dyn CredentialResolver> = match config.secrets_provider {
        SecretsProvider::Env => Arc::new(EnvCredentialResolver::new(
            &config.telemetry_secrets_id,
            &config.snowflake_secrets_id,
            vars.clone(),
        )),
        SecretsProvider::Aws => {
            let region = required_setting(config.aws_region.as_deref(), "AWS_REGION")?;
            let credentials = AwsCredentials::from_vars(vars)?;
            Arc::new(AwsSecretsResolver::new(region, credentials, timeout)?)
        }
        SecretsProvider::Azure => {
            let vault = required_setting(config.azure_vault_url.as_deref(), "AZURE_VAULT_URL")?;
            let vault_url = url::Url::parse(vault)
                .map_err(|e| CoreError::Config(format!("AZURE_VAULT_URL 파싱 실패: {e}")))?;
            Arc::new(AzureKeyVaultResolver::new(
                vault_url,
                AccessTokenSource::azure_from_vars(vars),
                timeout,
            )?)
        }
        SecretsProvider::Gcp => {
            let project = required_setting(config.gcp_project_id.as_deref(), "GCP_PROJECT_ID")?;
            Arc::new(GcpSecretManagerResolver::new(
                project,
                AccessTokenSource::gcp_from_vars(vars),
                timeout,
            )?)
        }
    };

    info!("자격증명 백엔드: {}", resolver.provider());
    Ok(resolver)
}

fn required_setting<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, CoreError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CoreError::Config(format!("{name} 설정 필요")))
}

/// 백엔드 공용 HTTP 클라이언트
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))
}

/// 시크릿 조회 요청 실행 후 JSON 응답 반환
///
/// 전송 실패, 2xx 이외 응답, 잘못된 JSON 모두 조회 에러로 변환한다.
pub(crate) async fn fetch_json(
    bundle_id: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, CoreError> {
    let resp = request.send().await.map_err(|e| {
        error!("시크릿 {bundle_id} 요청 실패: {e}");
        CoreError::credential(bundle_id, format!("요청 실패: {e}"))
    })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("시크릿 {bundle_id} 조회 실패: HTTP {status}");
        return Err(CoreError::credential(
            bundle_id,
            format!("HTTP {}: {body}", status.as_u16()),
        ));
    }

    resp.json()
        .await
        .map_err(|e| CoreError::credential(bundle_id, format!("응답 파싱 실패: {e}")))
}

/// 시크릿 문자열(JSON 객체)을 번들로 변환
///
/// 값은 문자열, 숫자, 불리언만 허용한다.
pub(crate) fn parse_secret_object(bundle_id: &str, text: &str) -> Result<CredentialBundle, CoreError> {
    let value: serde_json::Value = json::loads(text)
        .map_err(|e| CoreError::credential(bundle_id, format!("시크릿 페이로드가 JSON이 아님: {e}")))?;

    let serde_json::Value::Object(map) = value else {
        return Err(CoreError::credential(bundle_id, "시크릿 페이로드가 JSON 객체가 아님"));
    };

    let mut fields = BTreeMap::new();
    for (key, value) in map {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => {
                return Err(CoreError::credential(
                    bundle_id,
                    format!("시크릿 필드 {key}의 값이 스칼라가 아님"),
                ))
            }
        };
        fields.insert(key, text);
    }

    debug!("시크릿 {bundle_id}: {}개 필드", fields.len());
    Ok(CredentialBundle::new(bundle_id, fields))
}

/// URL 경로 끝에 `/` 보장 (`Url::join` 기준점)
pub(crate) fn with_trailing_slash(mut url: url::Url) -> url::Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
