//! 애플리케이션 설정 구조체.
//!
//! 수집 API, 시크릿 백엔드, 웨어하우스, 배치/재시도 설정을 정의한다.
//! `config` crate를 통해 환경변수에서 로드 (`costfeed-app::settings`).
//! 환경변수 이름은 필드명의 대문자 표기와 같다 (`MAX_RECORDS_PER_CALL` 등).

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::credentials::SecretsProvider;
use crate::models::telemetry::TELEMETRY_PATH;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 수집 API 기본 URL
    #[serde(default = "default_telemetry_url")]
    pub telemetry_url: String,
    /// 수집 API 키 번들 식별자
    #[serde(default = "default_telemetry_secrets_id")]
    pub telemetry_secrets_id: String,
    /// 웨어하우스 로그인 번들 식별자
    #[serde(default = "default_snowflake_secrets_id")]
    pub snowflake_secrets_id: String,
    /// 기본 웨어하우스 이름
    #[serde(default = "default_warehouse")]
    pub default_warehouse: String,
    /// 호출당 최대 레코드 수 (배치 크기)
    #[serde(default = "default_max_records_per_call")]
    pub max_records_per_call: usize,
    /// 데이터 지연 버퍼 (시간)
    #[serde(default = "default_data_latency_hours")]
    pub data_latency_hours: u32,
    /// 텔레메트리 스트림 이름
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    /// 로그 레벨 (DEBUG, INFO, WARNING, ERROR)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 시크릿 백엔드
    #[serde(default)]
    pub secrets_provider: SecretsProvider,
    /// 텔레메트리 뷰 (점 구분 `DB.SCHEMA.NAME`)
    #[serde(default = "default_telemetry_view")]
    pub telemetry_view: String,
    /// 로컬 웨어하우스 DB 파일
    #[serde(default = "default_warehouse_path")]
    pub warehouse_path: PathBuf,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 배치당 추가 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub telemetry_max_retries: u32,
    /// 지수 백오프 계수 (초)
    #[serde(default = "default_backoff_factor")]
    pub telemetry_backoff_factor: f64,
    /// AWS 리전 (aws 백엔드)
    #[serde(default)]
    pub aws_region: Option<String>,
    /// Azure Key Vault URL (azure 백엔드)
    #[serde(default)]
    pub azure_vault_url: Option<String>,
    /// GCP 프로젝트 ID (gcp 백엔드)
    #[serde(default)]
    pub gcp_project_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telemetry_url: default_telemetry_url(),
            telemetry_secrets_id: default_telemetry_secrets_id(),
            snowflake_secrets_id: default_snowflake_secrets_id(),
            default_warehouse: default_warehouse(),
            max_records_per_call: default_max_records_per_call(),
            data_latency_hours: default_data_latency_hours(),
            stream_name: default_stream_name(),
            log_level: default_log_level(),
            secrets_provider: SecretsProvider::default(),
            telemetry_view: default_telemetry_view(),
            warehouse_path: default_warehouse_path(),
            request_timeout_secs: default_request_timeout_secs(),
            telemetry_max_retries: default_max_retries(),
            telemetry_backoff_factor: default_backoff_factor(),
            aws_region: None,
            azure_vault_url: None,
            gcp_project_id: None,
        }
    }
}

impl AppConfig {
    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_records_per_call == 0 {
            return Err(CoreError::Config(
                "MAX_RECORDS_PER_CALL은 1 이상이어야 함".to_string(),
            ));
        }
        if self.stream_name.trim().is_empty() {
            return Err(CoreError::Config("STREAM_NAME이 비어 있음".to_string()));
        }
        if !self.telemetry_backoff_factor.is_finite() || self.telemetry_backoff_factor < 0.0 {
            return Err(CoreError::Config(format!(
                "TELEMETRY_BACKOFF_FACTOR가 잘못됨: {}",
                self.telemetry_backoff_factor
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "REQUEST_TIMEOUT_SECS는 1 이상이어야 함".to_string(),
            ));
        }

        self.telemetry_endpoint()?;
        self.view()?;

        let missing = match self.secrets_provider {
            SecretsProvider::Env => None,
            SecretsProvider::Aws => self.aws_region.is_none().then_some("AWS_REGION"),
            SecretsProvider::Azure => self.azure_vault_url.is_none().then_some("AZURE_VAULT_URL"),
            SecretsProvider::Gcp => self.gcp_project_id.is_none().then_some("GCP_PROJECT_ID"),
        };
        if let Some(key) = missing {
            return Err(CoreError::Config(format!(
                "{} 백엔드에는 {key} 환경변수가 필요함",
                self.secrets_provider
            )));
        }

        Ok(())
    }

    /// 수집 엔드포인트 전체 URL (`{TELEMETRY_URL}/unit-cost/v1/telemetry`)
    pub fn telemetry_endpoint(&self) -> Result<url::Url, CoreError> {
        let base = url::Url::parse(&self.telemetry_url).map_err(|e| {
            CoreError::Config(format!("TELEMETRY_URL 파싱 실패 ({}): {e}", self.telemetry_url))
        })?;
        base.join(TELEMETRY_PATH)
            .map_err(|e| CoreError::Config(format!("수집 엔드포인트 생성 실패: {e}")))
    }

    /// 텔레메트리 뷰 이름
    pub fn view(&self) -> Result<ViewName, CoreError> {
        self.telemetry_view.parse()
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 백오프 계수를 Duration으로 반환
    pub fn backoff_factor(&self) -> Duration {
        Duration::from_secs_f64(self.telemetry_backoff_factor)
    }
}

/// 점으로 구분된 뷰 이름 (`DB.SCHEMA.NAME`, `SCHEMA.NAME`, `NAME`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewName {
    parts: Vec<String>,
}

impl std::str::FromStr for ViewName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s
            .split('.')
            .map(|p| p.trim().trim_matches('"').to_string())
            .collect();

        if parts.len() > 3 || parts.iter().any(|p| p.is_empty() || p.contains('"')) {
            return Err(CoreError::Config(format!("잘못된 뷰 이름: {s:?}")));
        }

        Ok(Self { parts })
    }
}

impl fmt::Display for ViewName {
    /// 각 부분을 큰따옴표로 감싼 SQL 식별자 (`"DB"."SCHEMA"."NAME"`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.parts.iter().map(|p| format!("\"{p}\"")).collect();
        f.write_str(&quoted.join("."))
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_telemetry_url() -> String {
    "https://api.cloudzero.com".to_string()
}
fn default_telemetry_secrets_id() -> String {
    "cloudzero_telemetry_secrets".to_string()
}
fn default_snowflake_secrets_id() -> String {
    "snowflake_secrets".to_string()
}
fn default_warehouse() -> String {
    "COMPUTE_WH".to_string()
}
fn default_max_records_per_call() -> usize {
    3000
}
fn default_data_latency_hours() -> u32 {
    1
}
fn default_stream_name() -> String {
    "snowflake-telemetry".to_string()
}
fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_telemetry_view() -> String {
    "OPERATIONS.CLOUDZERO_TELEMETRY.QUERY_EXECUTION_TIME".to_string()
}
fn default_warehouse_path() -> PathBuf {
    PathBuf::from("warehouse.db")
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_factor() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_records_per_call, 3000);
        assert_eq!(config.data_latency_hours, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.telemetry_max_retries, 3);
        assert_eq!(config.secrets_provider, SecretsProvider::Env);
    }

    #[test]
    fn endpoint_appends_path() {
        let mut config = AppConfig::default();
        config.telemetry_url = "http://localhost:8080/".to_string();
        assert_eq!(
            config.telemetry_endpoint().unwrap().as_str(),
            "http://localhost:8080/unit-cost/v1/telemetry"
        );
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.max_records_per_call = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = AppConfig::default();
        config.stream_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.telemetry_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.telemetry_backoff_factor = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_settings_required() {
        let mut config = AppConfig::default();
        config.secrets_provider = SecretsProvider::Aws;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AWS_REGION"));

        config.aws_region = Some("us-east-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn view_name_quoting() {
        let view: ViewName = "OPERATIONS.CLOUDZERO_TELEMETRY.QUERY_EXECUTION_TIME"
            .parse()
            .unwrap();
        assert_eq!(
            view.to_string(),
            r#""OPERATIONS"."CLOUDZERO_TELEMETRY"."QUERY_EXECUTION_TIME""#
        );

        let single: ViewName = "query_execution_time".parse().unwrap();
        assert_eq!(single.to_string(), r#""query_execution_time""#);

        assert!("a..b".parse::<ViewName>().is_err());
        assert!("a.b.c.d".parse::<ViewName>().is_err());
    }
}
