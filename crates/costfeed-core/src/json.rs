//! JSON 직렬화 유틸리티.
//!
//! serde 기반이므로 확장 스칼라 타입은 각 타입의 `Serialize` 구현을 따른다:
//! `rust_decimal::Decimal`은 문자열, `uuid::Uuid`는 하이픈 문자열,
//! 단위 enum은 문자열 값, `chrono` 타임스탬프는 오프셋 포함 ISO-8601.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;

/// JSON 문자열로 직렬화
pub fn dumps<T: Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    Ok(serde_json::to_string(value)?)
}

/// JSON 문자열 역직렬화
pub fn loads<T: DeserializeOwned>(s: &str) -> Result<T, CoreError> {
    Ok(serde_json::from_str(s)?)
}

/// 임의 값을 전송 가능한 JSON 트리로 변환
pub fn serializable<T: Serialize + ?Sized>(value: &T) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(value)?)
}

/// 들여쓰기 2칸, 키 정렬 출력
///
/// `Value` 트리를 거치면 객체 키가 정렬된다 (`preserve_order` 미사용 시 `Map`은 `BTreeMap`).
pub fn pretty_dumps<T: Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(&serializable(value)?)?)
}
