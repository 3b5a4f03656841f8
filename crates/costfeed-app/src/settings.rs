//! 설정 로딩.
//!
//! 환경 변수(`TELEMETRY_URL`, `MAX_RECORDS_PER_CALL` 등)를 `config` 크레이트로 읽어
//! `AppConfig`로 역직렬화한 뒤 검증한다.

use config::{Config, Environment};
use costfeed_core::config::AppConfig;
use costfeed_core::error::CoreError;
use std::collections::HashMap;

/// 프로세스 환경 변수에서 설정 로드
pub fn load() -> Result<AppConfig, CoreError> {
    build(Environment::default())
}

/// 주어진 키/값에서 설정 로드 (키는 환경 변수 이름)
pub fn load_from(vars: HashMap<String, String>) -> Result<AppConfig, CoreError> {
    build(Environment::default().source(Some(vars.into_iter().collect())))
}

fn build(env: Environment) -> Result<AppConfig, CoreError> {
    let config: AppConfig = Config::builder()
        .add_source(env)
        .build()
        .and_then(|c| c.try_deserialize::<AppConfig>())
        .map_err(|e| CoreError::Config(format!("설정 로드 실패: {e}")))?;

    config.validate()?;
    Ok(config)
}

/// 로그 레벨 이름을 `EnvFilter` 지시자로 변환
///
/// DEBUG, INFO, WARNING(WARN), ERROR, TRACE를 대소문자 구분 없이 받는다.
pub fn log_directive(level: &str) -> Result<&'static str, CoreError> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok("trace"),
        "DEBUG" => Ok("debug"),
        "INFO" => Ok("info"),
        "WARNING" | "WARN" => Ok("warn"),
        "ERROR" => Ok("error"),
        other => Err(CoreError::Config(format!("알 수 없는 로그 레벨: {other}"))),
    }
}
