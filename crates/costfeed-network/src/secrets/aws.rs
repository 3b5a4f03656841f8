//! AWS Secrets Manager 백엔드.
//!
//! `GetSecretValue` JSON API를 Signature V4로 서명해 호출한다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::{CredentialBundle, SecretsProvider};
use costfeed_core::ports::credentials::CredentialResolver;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::{build_client, fetch_json, parse_secret_object};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "secretsmanager";
const TARGET: &str = "secretsmanager.GetSecretValue";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// AWS 정적 자격증명
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CoreError> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        let access_key_id = get("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| CoreError::Config("AWS_ACCESS_KEY_ID 환경 변수 필요".to_string()))?;
        let secret_access_key = get("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| CoreError::Config("AWS_SECRET_ACCESS_KEY 환경 변수 필요".to_string()))?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: get("AWS_SESSION_TOKEN"),
        })
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
}

/// AWS Secrets Manager 백엔드
pub struct AwsSecretsResolver {
    client: reqwest::Client,
    region: String,
    endpoint: url::Url,
    credentials: AwsCredentials,
}

impl AwsSecretsResolver {
    /// 리전 기본 엔드포인트로 생성
    pub fn new(
        region: &str,
        credentials: AwsCredentials,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let endpoint = url::Url::parse(&format!("https://{SERVICE}.{region}.amazonaws.com/"))
            .map_err(|e| CoreError::Config(format!("AWS 리전 {region} 잘못됨: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            region: region.to_string(),
            endpoint,
            credentials,
        })
    }

    /// 엔드포인트 교체 (VPC 엔드포인트, 테스트 서버)
    pub fn with_endpoint(mut self, endpoint: url::Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// 서명된 헤더 목록 (Authorization 포함)
    fn signed_headers(&self, body: &str, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        // 헤더 이름 사전순
        let mut headers: Vec<(&'static str, String)> = vec![
            ("content-type", JSON_CONTENT_TYPE.to_string()),
            ("host", self.host()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }
        headers.push(("x-amz-target", TARGET.to_string()));

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();
        let signed_names = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "POST\n{}\n\n{canonical_headers}\n{signed_names}\n{}",
            self.endpoint.path(),
            hex(&Sha256::digest(body.as_bytes()))
        );
        let scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            SERVICE,
        );
        let signature = hex(&hmac_sha256(&key, string_to_sign.as_bytes()));

        headers.push((
            "authorization",
            format!(
                "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_names}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        // host는 reqwest가 설정
        headers.retain(|(name, _)| *name != "host");
        headers
    }
}

#[async_trait]
impl CredentialResolver for AwsSecretsResolver {
    async fn resolve(&self, bundle_id: &str) -> Result<CredentialBundle, CoreError> {
        debug!("AWS Secrets Manager에서 시크릿 조회: {bundle_id}");

        let body = serde_json::json!({ "SecretId": bundle_id }).to_string();
        let mut request = self.client.post(self.endpoint.clone());
        for (name, value) in self.signed_headers(&body, Utc::now()) {
            request = request.header(name, value);
        }

        let value = fetch_json(bundle_id, request.body(body)).await?;
        let parsed: GetSecretValueResponse = serde_json::from_value(value)
            .map_err(|e| CoreError::credential(bundle_id, format!("응답 형식 오류: {e}")))?;
        let secret = parsed
            .secret_string
            .ok_or_else(|| CoreError::credential(bundle_id, "SecretString 없음"))?;

        parse_secret_object(bundle_id, &secret)
    }

    fn provider(&self) -> SecretsProvider {
        SecretsProvider::Aws
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC은 임의 길이 키를 허용
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// SigV4 서명 키 유도
fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
