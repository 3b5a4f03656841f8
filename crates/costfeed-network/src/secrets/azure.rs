//! Azure Key Vault 백엔드.

use async_trait::async_trait;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::{CredentialBundle, SecretsProvider};
use costfeed_core::ports::credentials::CredentialResolver;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::token::AccessTokenSource;
use super::{build_client, fetch_json, parse_secret_object, with_trailing_slash};

const API_VERSION: &str = "7.4";

#[derive(Deserialize)]
struct SecretBundleResponse {
    value: Option<String>,
}

/// Key Vault 시크릿 이름: `_`는 `-`로 바꾼다
pub fn vault_secret_name(bundle_id: &str) -> String {
    bundle_id.replace('_', "-")
}

/// Azure Key Vault 백엔드
pub struct AzureKeyVaultResolver {
    client: reqwest::Client,
    vault_url: url::Url,
    token: AccessTokenSource,
}

impl AzureKeyVaultResolver {
    pub fn new(
        vault_url: url::Url,
        token: AccessTokenSource,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_client(timeout)?,
            vault_url: with_trailing_slash(vault_url),
            token,
        })
    }
}

#[async_trait]
impl CredentialResolver for AzureKeyVaultResolver {
    async fn resolve(&self, bundle_id: &str) -> Result<CredentialBundle, CoreError> {
        let name = vault_secret_name(bundle_id);
        debug!("Azure Key Vault에서 시크릿 조회: {name}");

        let mut url = self
            .vault_url
            .join(&format!("secrets/{name}"))
            .map_err(|e| CoreError::credential(bundle_id, format!("URL 생성 실패: {e}")))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);

        let token = self
            .token
            .token(&self.client)
            .await
            .map_err(|e| CoreError::credential(bundle_id, format!("액세스 토큰 획득 실패: {e}")))?;

        let value = fetch_json(bundle_id, self.client.get(url).bearer_auth(token)).await?;
        let parsed: SecretBundleResponse = serde_json::from_value(value)
            .map_err(|e| CoreError::credential(bundle_id, format!("응답 형식 오류: {e}")))?;
        let secret = parsed
            .value
            .ok_or_else(|| CoreError::credential(bundle_id, "시크릿 value 없음"))?;

        parse_secret_object(bundle_id, &secret)
    }

    fn provider(&self) -> SecretsProvider {
        SecretsProvider::Azure
    }
}
