//! # costfeed
//!
//! 웨어하우스 텔레메트리 뷰를 조회해 단위 비용 수집 API로 전송하는 CLI.
//! 어댑터 조립, 로깅 초기화, 종료 코드 결정을 담당한다.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use costfeed_app::coordinator::{check_connections, ExtractionCoordinator};
use costfeed_app::settings;
use costfeed_app::window::TimeWindow;
use costfeed_core::json;
use costfeed_core::models::credentials::WarehouseLogin;
use costfeed_core::models::report::RunOutcome;
use costfeed_network::batch_uploader::BatchDispatcher;
use costfeed_network::http_client::TelemetryHttpClient;
use costfeed_network::retry::RetryPolicy;
use costfeed_network::secrets::create_resolver;
use costfeed_storage::sqlite::SqliteWarehouse;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 웨어하우스 사용량 텔레메트리 수집기
///
/// 예시:
///   costfeed queries/query_tags_by_time.sql
///   costfeed --start 2024-01-01T00:00:00 --end 2024-01-01T01:00:00 query.sql
#[derive(Parser, Debug)]
#[command(name = "costfeed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 뷰 정의 SQL 파일 경로
    sql_file: PathBuf,

    /// 수집 시작 시각 (ISO 8601, 기본: 직전 완결 시간대)
    #[arg(long, requires = "end")]
    start: Option<String>,

    /// 수집 종료 시각 (ISO 8601, 제외)
    #[arg(long, requires = "start")]
    end: Option<String>,

    /// 텔레메트리 스트림 이름 (기본: STREAM_NAME)
    #[arg(long)]
    stream_name: Option<String>,

    /// 조회만 하고 전송하지 않음
    #[arg(long)]
    dry_run: bool,

    /// 웨어하우스와 수집 API 연결만 확인
    #[arg(long)]
    test_connection: bool,

    /// 로그 레벨 (기본: LOG_LEVEL)
    #[arg(long, ignore_case = true, value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    log_level: Option<String>,
}

fn init_tracing(level: &str) -> Result<()> {
    let level = settings::log_directive(level)?;
    let log_filter = format!(
        "costfeed={level},costfeed_app={level},costfeed_core={level},costfeed_network={level},costfeed_storage={level}"
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 설정 로드 실패도 로그로 남기기 위해 tracing 먼저 초기화
    let loaded = settings::load();
    let level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "INFO".to_string());
    init_tracing(&level)?;

    let config = loaded.map_err(|e| {
        error!("설정 로드 실패: {e}");
        e
    })?;

    info!("costfeed 텔레메트리 수집 시작");

    if !args.sql_file.exists() {
        error!("쿼리 파일 없음: {}", args.sql_file.display());
        return Err(anyhow!("쿼리 파일 없음: {}", args.sql_file.display()));
    }

    // 어댑터 조립
    let resolver = create_resolver(&config)?;

    let warehouse_bundle = resolver.resolve(&config.snowflake_secrets_id).await?;
    let login = WarehouseLogin::from_bundle(&warehouse_bundle)?;
    let warehouse = Arc::new(SqliteWarehouse::open(
        &config.warehouse_path,
        &login,
        &config.default_warehouse,
    )?);

    let client = Arc::new(
        TelemetryHttpClient::connect(
            resolver.as_ref(),
            &config.telemetry_secrets_id,
            config.telemetry_endpoint()?,
            config.request_timeout(),
        )
        .await?,
    );

    if args.test_connection {
        info!("연결 테스트 중...");
        check_connections(warehouse.as_ref(), client.as_ref()).await?;
        return Ok(());
    }

    let window = match (&args.start, &args.end) {
        (Some(start), Some(end)) => TimeWindow::from_cli(start, end)?,
        _ => TimeWindow::default_for(Utc::now(), config.data_latency_hours)?,
    };
    info!("수집 기간: {window}");

    let stream_name = args
        .stream_name
        .clone()
        .unwrap_or_else(|| config.stream_name.clone());

    let policy = RetryPolicy::default()
        .with_max_retries(config.telemetry_max_retries)
        .with_backoff_factor(config.backoff_factor());
    let coordinator = ExtractionCoordinator::new(
        warehouse,
        BatchDispatcher::new(client, policy),
        config.view()?,
        config.max_records_per_call,
    );

    match coordinator
        .run(&window, &args.sql_file, &stream_name, args.dry_run)
        .await
    {
        Ok(RunOutcome::Delivered(report)) => {
            info!(
                "텔레메트리 수집 완료: {}개 레코드, {}개 배치, {:.2}s (run={})",
                report.records_sent,
                report.batches_sent,
                report.elapsed.as_secs_f64(),
                report.run_id
            );
            Ok(())
        }
        Ok(RunOutcome::DryRun(summary)) => {
            info!("드라이런 완료:\n{}", json::pretty_dumps(&summary)?);
            Ok(())
        }
        Ok(RunOutcome::Empty { skipped_rows }) => {
            warn!("전송할 레코드 없음 (건너뛴 행 {skipped_rows}개)");
            Ok(())
        }
        Err(e) => {
            error!("텔레메트리 수집 실패: {e}");
            Err(e.into())
        }
    }
}
