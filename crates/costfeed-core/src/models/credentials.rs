//! 자격증명 번들 모델.
//!
//! 번들 값은 로그/직렬화 대상이 아니다. `Debug`는 키만 출력하며
//! `Serialize`를 구현하지 않는다.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 수집 API 키 필드
pub const API_KEY_FIELD: &str = "external_api_key";
/// 웨어하우스 사용자 필드
pub const USER_FIELD: &str = "user";
/// 웨어하우스 비밀번호 필드
pub const PASSWORD_FIELD: &str = "password";
/// 웨어하우스 계정 필드
pub const ACCOUNT_FIELD: &str = "account";

/// 이름 붙은 시크릿 필드 묶음
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    bundle_id: String,
    fields: BTreeMap<String, String>,
}

impl CredentialBundle {
    /// 새 번들 생성
    pub fn new(bundle_id: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            fields,
        }
    }

    /// 번들 식별자
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// 필드 값 조회
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// 필수 필드 조회: 없거나 비어 있으면 설정 에러
    pub fn require(&self, key: &str) -> Result<&str, CoreError> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CoreError::Config(format!(
                "자격증명 번들 {}에 필수 필드 {key} 없음",
                self.bundle_id
            ))),
        }
    }

    /// 필드 키 목록 (값은 노출하지 않음)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("bundle_id", &self.bundle_id)
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// 웨어하우스 로그인 정보 (`user`/`password`/`account`)
#[derive(Clone)]
pub struct WarehouseLogin {
    pub user: String,
    pub password: String,
    pub account: String,
}

impl WarehouseLogin {
    /// 번들에서 세 필수 필드 추출
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self, CoreError> {
        Ok(Self {
            user: bundle.require(USER_FIELD)?.to_string(),
            password: bundle.require(PASSWORD_FIELD)?.to_string(),
            account: bundle.require(ACCOUNT_FIELD)?.to_string(),
        })
    }
}

impl fmt::Debug for WarehouseLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseLogin")
            .field("user", &self.user)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// 시크릿 백엔드 종류: 프로세스당 하나만 활성화
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SecretsProvider {
    /// 환경변수 (기본)
    #[default]
    Env,
    /// AWS Secrets Manager
    Aws,
    /// Azure Key Vault
    Azure,
    /// Google Cloud Secret Manager
    Gcp,
}

impl SecretsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }
}

impl fmt::Display for SecretsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretsProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" => Ok(Self::Gcp),
            other => Err(CoreError::Config(format!(
                "지원하지 않는 시크릿 백엔드: {other} (지원: env, aws, azure, gcp)"
            ))),
        }
    }
}

impl TryFrom<String> for SecretsProvider {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
