//! 설정 로딩과 어댑터 조립 테스트.
//!
//! 환경 스냅샷 → `AppConfig` → 자격증명 백엔드 → 수집 클라이언트/웨어하우스 순서로 조립한다.

use costfeed_app::coordinator::check_connections;
use costfeed_app::settings;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::{SecretsProvider, WarehouseLogin};
use costfeed_core::models::telemetry::TELEMETRY_PATH;
use costfeed_core::ports::credentials::CredentialResolver;
use costfeed_network::http_client::TelemetryHttpClient;
use costfeed_network::secrets::create_resolver_with_env;
use costfeed_storage::sqlite::SqliteWarehouse;
use mockito::Matcher;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn full_env(telemetry_url: &str) -> HashMap<String, String> {
    env(&[
        ("TELEMETRY_URL", telemetry_url),
        ("CLOUDZERO_API_KEY", "cz-key"),
        ("SNOWFLAKE_USER", "svc"),
        ("SNOWFLAKE_PASSWORD", "pw"),
        ("SNOWFLAKE_ACCOUNT", "acct"),
    ])
}

#[tokio::test]
async fn env_backend_resolves_both_bundles() {
    let vars = full_env("https://api.cloudzero.com");
    let config = settings::load_from(vars.clone()).unwrap();
    let resolver = create_resolver_with_env(&config, &vars).unwrap();
    assert_eq!(resolver.provider(), SecretsProvider::Env);

    let bundle = resolver.resolve(&config.snowflake_secrets_id).await.unwrap();
    let login = WarehouseLogin::from_bundle(&bundle).unwrap();
    assert_eq!(login.user, "svc");
    assert_eq!(login.account, "acct");

    let api = resolver.resolve(&config.telemetry_secrets_id).await.unwrap();
    assert_eq!(api.get("external_api_key"), Some("cz-key"));
}

#[tokio::test]
async fn missing_api_key_fails_client_construction() {
    let mut vars = full_env("https://api.cloudzero.com");
    vars.remove("CLOUDZERO_API_KEY");
    let config = settings::load_from(vars.clone()).unwrap();
    let resolver = create_resolver_with_env(&config, &vars).unwrap();

    let result = TelemetryHttpClient::connect(
        resolver.as_ref(),
        &config.telemetry_secrets_id,
        config.telemetry_endpoint().unwrap(),
        config.request_timeout(),
    )
    .await;

    let err = result.err().unwrap();
    assert!(matches!(err, CoreError::Config(_)));
    assert!(err.to_string().contains("CLOUDZERO_API_KEY"));
}

#[tokio::test]
async fn connection_check_pings_both_sides() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", TELEMETRY_PATH)
        .match_header("authorization", "cz-key")
        .match_body(Matcher::Regex("test-connection".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let vars = full_env(&server.url());
    let config = settings::load_from(vars.clone()).unwrap();
    let resolver = create_resolver_with_env(&config, &vars).unwrap();
    let client = TelemetryHttpClient::connect(
        resolver.as_ref(),
        &config.telemetry_secrets_id,
        config.telemetry_endpoint().unwrap(),
        config.request_timeout(),
    )
    .await
    .unwrap();

    let warehouse = SqliteWarehouse::open_in_memory().unwrap();
    check_connections(&warehouse, &client).await.unwrap();

    mock.assert_async().await;
    assert!(!warehouse.is_open());
}

#[tokio::test]
async fn connection_check_reports_api_rejection() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", TELEMETRY_PATH)
        .with_status(401)
        .with_body("unauthorized")
        .create_async()
        .await;

    let vars = full_env(&server.url());
    let config = settings::load_from(vars.clone()).unwrap();
    let resolver = create_resolver_with_env(&config, &vars).unwrap();
    let client = TelemetryHttpClient::connect(
        resolver.as_ref(),
        &config.telemetry_secrets_id,
        config.telemetry_endpoint().unwrap(),
        config.request_timeout(),
    )
    .await
    .unwrap();

    let warehouse = SqliteWarehouse::open_in_memory().unwrap();
    let err = check_connections(&warehouse, &client).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn cloud_provider_requires_its_setting() {
    let err = settings::load_from(env(&[("SECRETS_PROVIDER", "azure")])).unwrap_err();
    assert!(err.to_string().contains("AZURE_VAULT_URL"));

    let config = settings::load_from(env(&[
        ("SECRETS_PROVIDER", "azure"),
        ("AZURE_VAULT_URL", "https://myvault.vault.azure.net"),
    ]))
    .unwrap();
    assert_eq!(config.secrets_provider, SecretsProvider::Azure);
}
