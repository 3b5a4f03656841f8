//! 클라우드 시크릿 저장소용 Bearer 토큰 공급원.
//!
//! 환경 변수로 받은 고정 토큰 또는 인스턴스 메타데이터 서버의 관리형 ID 토큰.

use costfeed_core::error::CoreError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Azure 정적 토큰 환경 변수
pub const AZURE_TOKEN_VAR: &str = "AZURE_ACCESS_TOKEN";
/// GCP 정적 토큰 환경 변수
pub const GCP_TOKEN_VAR: &str = "GCP_ACCESS_TOKEN";

const AZURE_IMDS_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01&resource=https%3A%2F%2Fvault.azure.net";
const GCP_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Bearer 토큰 공급원
#[derive(Clone)]
pub enum AccessTokenSource {
    /// 고정 토큰
    Static(String),
    /// 메타데이터 서버 (`access_token` 필드를 가진 JSON 응답)
    MetadataServer {
        url: String,
        header: (&'static str, &'static str),
    },
}

impl AccessTokenSource {
    /// `AZURE_ACCESS_TOKEN`이 있으면 고정 토큰, 없으면 Azure IMDS
    pub fn azure_from_vars(vars: &HashMap<String, String>) -> Self {
        match non_empty(vars, AZURE_TOKEN_VAR) {
            Some(token) => Self::Static(token),
            None => Self::MetadataServer {
                url: AZURE_IMDS_URL.to_string(),
                header: ("Metadata", "true"),
            },
        }
    }

    /// `GCP_ACCESS_TOKEN`이 있으면 고정 토큰, 없으면 GCE 메타데이터 서버
    pub fn gcp_from_vars(vars: &HashMap<String, String>) -> Self {
        match non_empty(vars, GCP_TOKEN_VAR) {
            Some(token) => Self::Static(token),
            None => Self::MetadataServer {
                url: GCP_METADATA_URL.to_string(),
                header: ("Metadata-Flavor", "Google"),
            },
        }
    }

    /// 토큰 획득
    pub async fn token(&self, client: &reqwest::Client) -> Result<String, CoreError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::MetadataServer { url, header } => {
                debug!("메타데이터 서버에서 액세스 토큰 요청: {url}");
                let resp = client
                    .get(url)
                    .header(header.0, header.1)
                    .send()
                    .await
                    .map_err(|e| CoreError::Network(format!("토큰 요청 실패: {e}")))?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(CoreError::HttpStatus {
                        status: status.as_u16(),
                        body: resp.text().await.unwrap_or_default(),
                    });
                }

                let parsed: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| CoreError::Network(format!("토큰 응답 파싱 실패: {e}")))?;
                Ok(parsed.access_token)
            }
        }
    }
}

impl fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(***)"),
            Self::MetadataServer { url, .. } => {
                f.debug_struct("MetadataServer").field("url", url).finish()
            }
        }
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).filter(|v| !v.is_empty()).cloned()
}
