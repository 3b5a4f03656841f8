//! 환경 변수 자격증명 백엔드 (기본값).

use async_trait::async_trait;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::{
    CredentialBundle, SecretsProvider, ACCOUNT_FIELD, API_KEY_FIELD, PASSWORD_FIELD, USER_FIELD,
};
use costfeed_core::ports::credentials::CredentialResolver;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 수집 API 키 환경 변수
pub const API_KEY_VAR: &str = "CLOUDZERO_API_KEY";
/// 웨어하우스 사용자 환경 변수
pub const USER_VAR: &str = "SNOWFLAKE_USER";
/// 웨어하우스 비밀번호 환경 변수
pub const PASSWORD_VAR: &str = "SNOWFLAKE_PASSWORD";
/// 웨어하우스 계정 환경 변수
pub const ACCOUNT_VAR: &str = "SNOWFLAKE_ACCOUNT";

const TELEMETRY_FIELDS: &[(&str, &str)] = &[(API_KEY_FIELD, API_KEY_VAR)];
const WAREHOUSE_FIELDS: &[(&str, &str)] = &[
    (USER_FIELD, USER_VAR),
    (PASSWORD_FIELD, PASSWORD_VAR),
    (ACCOUNT_FIELD, ACCOUNT_VAR),
];

/// 환경 변수 백엔드
///
/// 알려진 번들 두 개(수집 API, 웨어하우스)만 인식한다.
pub struct EnvCredentialResolver {
    telemetry_bundle_id: String,
    warehouse_bundle_id: String,
    vars: HashMap<String, String>,
}

impl EnvCredentialResolver {
    /// 환경 스냅샷을 지정해 생성
    pub fn new(
        telemetry_bundle_id: impl Into<String>,
        warehouse_bundle_id: impl Into<String>,
        vars: HashMap<String, String>,
    ) -> Self {
        Self {
            telemetry_bundle_id: telemetry_bundle_id.into(),
            warehouse_bundle_id: warehouse_bundle_id.into(),
            vars,
        }
    }

    fn fields_for(&self, bundle_id: &str) -> Option<&'static [(&'static str, &'static str)]> {
        if bundle_id == self.telemetry_bundle_id {
            Some(TELEMETRY_FIELDS)
        } else if bundle_id == self.warehouse_bundle_id {
            Some(WAREHOUSE_FIELDS)
        } else {
            None
        }
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(&self, bundle_id: &str) -> Result<CredentialBundle, CoreError> {
        debug!("환경 변수에서 자격증명 조회: {bundle_id}");

        let required = self
            .fields_for(bundle_id)
            .ok_or_else(|| CoreError::Config(format!("알 수 없는 자격증명 번들: {bundle_id}")))?;

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, var)| self.vars.get(*var).map_or(true, |v| v.is_empty()))
            .map(|(_, var)| *var)
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Config(format!(
                "환경 변수 필요: {}",
                missing.join(", ")
            )));
        }

        let fields: BTreeMap<String, String> = required
            .iter()
            .filter_map(|(field, var)| {
                self.vars
                    .get(*var)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect();

        Ok(CredentialBundle::new(bundle_id, fields))
    }

    fn provider(&self) -> SecretsProvider {
        SecretsProvider::Env
    }
}
