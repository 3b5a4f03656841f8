//! 추출 오케스트레이션.
//!
//! 뷰 정의 적용 → 구간 조회 → 행 변환 → (드라이런 요약 | 배치 전송).
//! 웨어하우스 연결은 `WarehouseGuard`로 모든 종료 경로에서 닫힌다.

use costfeed_core::config::ViewName;
use costfeed_core::error::CoreError;
use costfeed_core::models::report::{DryRunSummary, RunOutcome};
use costfeed_core::models::row::convert_rows;
use costfeed_core::models::telemetry::Granularity;
use costfeed_core::ports::warehouse::{Warehouse, WarehouseGuard};
use costfeed_network::batch_uploader::BatchDispatcher;
use costfeed_network::http_client::TelemetryHttpClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::window::TimeWindow;

/// 단계 실패를 경과 시간과 함께 기록
fn stage_failed(stage: &str, started: Instant, e: CoreError) -> CoreError {
    error!(
        "{stage} 실패 ({:.2}s 경과): {e}",
        started.elapsed().as_secs_f64()
    );
    e
}

/// 조회 SQL: 반개구간, 최신순
pub fn select_sql(view: &ViewName, warehouse: &dyn Warehouse) -> String {
    let ts = warehouse.instant_expr("timestamp");
    let bound = warehouse.instant_expr("?");
    format!(
        "SELECT element_name, timestamp, filter, value FROM {view} \
         WHERE {ts} >= {bound} AND {ts} < {bound} \
         ORDER BY {ts} DESC, element_name"
    )
}

/// 쿼리 파일 로드: 없으면 설정 에러
pub async fn read_source(source: &Path) -> Result<String, CoreError> {
    match tokio::fs::read_to_string(source).await {
        Ok(sql) => Ok(sql),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::Config(format!(
            "쿼리 파일 없음: {}",
            source.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// 추출 코디네이터: 한 번의 실행 동안 웨어하우스 연결과 전송 클라이언트를 독점한다
pub struct ExtractionCoordinator {
    warehouse: Arc<dyn Warehouse>,
    dispatcher: BatchDispatcher,
    view: ViewName,
    max_batch_size: usize,
}

impl ExtractionCoordinator {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        dispatcher: BatchDispatcher,
        view: ViewName,
        max_batch_size: usize,
    ) -> Self {
        Self {
            warehouse,
            dispatcher,
            view,
            max_batch_size,
        }
    }

    /// 한 구간 추출 실행
    ///
    /// 유효 레코드가 없으면 `RunOutcome::Empty`(성공), 드라이런이면 전송 없이 요약을 반환한다.
    pub async fn run(
        &self,
        window: &TimeWindow,
        source: &Path,
        stream_name: &str,
        dry_run: bool,
    ) -> Result<RunOutcome, CoreError> {
        let started = Instant::now();
        let view_sql = read_source(source)
            .await
            .map_err(|e| stage_failed("쿼리 파일 로드", started, e))?;

        let rows = {
            let warehouse = WarehouseGuard::new(self.warehouse.as_ref());

            info!("뷰 생성/갱신: {}", source.display());
            warehouse
                .execute_script(&view_sql)
                .await
                .map_err(|e| stage_failed("뷰 갱신", started, e))?;

            info!("텔레메트리 조회: {window} ({})", self.view);
            warehouse
                .query(&select_sql(&self.view, &*warehouse), &window.bounds())
                .await
                .map_err(|e| stage_failed("텔레메트리 조회", started, e))?
        };

        let mut conversion = convert_rows(rows.iter(), Granularity::Hourly, stream_name);
        let selected = conversion.records.len();
        conversion
            .records
            .retain(|record| window.contains(record.timestamp()));
        if conversion.records.len() < selected {
            warn!(
                "구간 밖 레코드 {}개 제외",
                selected - conversion.records.len()
            );
        }
        let skipped_rows = conversion.skipped_count();
        info!(
            "{}개 행에서 {}개 레코드 수집 ({:.2}s)",
            rows.len(),
            conversion.records.len(),
            started.elapsed().as_secs_f64()
        );

        if conversion.records.is_empty() {
            warn!("수집된 텔레메트리 레코드 없음");
            return Ok(RunOutcome::Empty { skipped_rows });
        }

        if dry_run {
            let summary = DryRunSummary::new(Uuid::new_v4(), &conversion.records, skipped_rows);
            info!(
                "드라이런: {}개 레코드 전송 생략 (합계 {})",
                summary.record_count, summary.total_value
            );
            for record in &summary.sample {
                info!("샘플 레코드: {record:?}");
            }
            return Ok(RunOutcome::DryRun(summary));
        }

        info!("{}개 레코드 전송 시작", conversion.records.len());
        let report = self
            .dispatcher
            .deliver(&conversion.records, self.max_batch_size, stream_name)
            .await
            .map_err(|e| stage_failed("텔레메트리 전송", started, e))?;

        Ok(RunOutcome::Delivered(report))
    }
}

/// 웨어하우스와 수집 API 연결 확인
pub async fn check_connections(
    warehouse: &dyn Warehouse,
    client: &TelemetryHttpClient,
) -> Result<(), CoreError> {
    {
        let guard = WarehouseGuard::new(warehouse);
        guard.ping().await.map_err(|e| {
            error!("웨어하우스 연결 실패: {e}");
            e
        })?;
    }
    info!("웨어하우스 연결 성공");

    client.test_connection().await.map_err(|e| {
        error!("수집 API 연결 실패: {e}");
        e
    })?;
    info!("모든 연결 확인 완료");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use costfeed_core::models::row::Row;
    use costfeed_core::models::report::ValueTotal;
    use costfeed_core::ports::telemetry::{SerializedBatch, TelemetrySink};
    use costfeed_network::retry::RetryPolicy;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 스크립트/쿼리 호출을 기록하고 고정 행을 돌려주는 웨어하우스
    #[derive(Default)]
    struct FakeWarehouse {
        rows: Vec<Row>,
        fail_script: bool,
        calls: Mutex<Vec<(String, Vec<String>)>>,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn execute_script(&self, sql: &str) -> Result<(), CoreError> {
            self.calls.lock().unwrap().push((sql.to_string(), vec![]));
            if self.fail_script {
                return Err(CoreError::Warehouse("syntax error".to_string()));
            }
            Ok(())
        }

        async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, CoreError> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<SerializedBatch>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn send(&self, batch: &SerializedBatch) -> Result<(), CoreError> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn row(name: Option<&str>, ts: &str, value: f64) -> Row {
        let mut row = Row::new();
        if let Some(name) = name {
            row.insert("element_name".into(), name.into());
        }
        row.insert("timestamp".into(), ts.into());
        row.insert("filter".into(), r#"{"warehouse":["WH1"]}"#.into());
        row.insert("value".into(), value.into());
        row
    }

    struct Fixture {
        warehouse: Arc<FakeWarehouse>,
        sink: Arc<RecordingSink>,
        coordinator: ExtractionCoordinator,
        source: tempfile::NamedTempFile,
        window: TimeWindow,
    }

    fn fixture(warehouse: FakeWarehouse, max_batch_size: usize) -> Fixture {
        let warehouse = Arc::new(warehouse);
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = BatchDispatcher::new(
            sink.clone(),
            RetryPolicy::default().with_backoff_factor(Duration::ZERO),
        );
        let coordinator = ExtractionCoordinator::new(
            warehouse.clone(),
            dispatcher,
            "DB.SCHEMA.VIEW".parse().unwrap(),
            max_batch_size,
        );

        let source = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(source.path(), "CREATE VIEW v AS SELECT 1;").unwrap();

        Fixture {
            warehouse,
            sink,
            coordinator,
            source,
            window: TimeWindow::from_cli("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z").unwrap(),
        }
    }

    #[test]
    fn select_statement() {
        let view: ViewName = "OPERATIONS.CLOUDZERO_TELEMETRY.QUERY_EXECUTION_TIME".parse().unwrap();
        assert_eq!(
            select_sql(&view, &FakeWarehouse::default()),
            "SELECT element_name, timestamp, filter, value FROM \
             \"OPERATIONS\".\"CLOUDZERO_TELEMETRY\".\"QUERY_EXECUTION_TIME\" \
             WHERE timestamp >= ? AND timestamp < ? ORDER BY timestamp DESC, element_name"
        );
    }

    #[tokio::test]
    async fn records_outside_window_are_dropped() {
        let f = fixture(
            FakeWarehouse {
                rows: vec![
                    row(Some("at-end"), "2024-01-01T01:00:00+00:00", 5.0),
                    row(Some("mid-kst"), "2024-01-01T09:30:00+09:00", 2.0),
                    row(Some("at-start"), "2024-01-01T00:00:00+00:00", 1.0),
                    row(Some("before"), "2024-01-01T08:59:59+09:00", 7.0),
                ],
                ..Default::default()
            },
            10,
        );

        let outcome = f
            .coordinator
            .run(&f.window, f.source.path(), "stream", true)
            .await
            .unwrap();

        let RunOutcome::DryRun(summary) = outcome else {
            panic!("expected dry run");
        };
        let names: Vec<&str> = summary.sample.iter().map(|r| r.element_name()).collect();
        assert_eq!(names, vec!["mid-kst", "at-start"]);
        assert_eq!(summary.skipped_rows, 0);
        assert_eq!(summary.total_value, ValueTotal::Exact(Decimal::from(3)));
    }

    #[tokio::test]
    async fn delivers_valid_rows_and_skips_invalid() {
        let f = fixture(
            FakeWarehouse {
                rows: vec![
                    row(Some("q1"), "2024-01-01T00:50:00Z", 3.0),
                    row(None, "2024-01-01T00:40:00Z", 1.0),
                    row(Some("q2"), "2024-01-01T00:30:00Z", 2.0),
                ],
                ..Default::default()
            },
            1,
        );

        let outcome = f
            .coordinator
            .run(&f.window, f.source.path(), "stream", false)
            .await
            .unwrap();

        let RunOutcome::Delivered(report) = outcome else {
            panic!("expected delivery");
        };
        assert_eq!(report.records_sent, 2);
        assert_eq!(report.batches_sent, 2);

        let calls = f.warehouse.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "CREATE VIEW v AS SELECT 1;");
        assert_eq!(
            calls[1].1,
            vec!["2024-01-01T00:00:00Z".to_string(), "2024-01-01T01:00:00Z".to_string()]
        );
        assert_eq!(f.warehouse.closed.load(Ordering::SeqCst), 1);

        // 조회 순서 그대로 전송
        let batches = f.sink.batches.lock().unwrap().clone();
        let names: Vec<String> = batches
            .iter()
            .map(|b| {
                let payload: serde_json::Value = serde_json::from_slice(&b.body).unwrap();
                payload["records"][0]["element-name"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(names, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let f = fixture(
            FakeWarehouse {
                rows: (0..8)
                    .map(|i| row(Some(&format!("q{i}")), "2024-01-01T00:10:00Z", 0.5))
                    .collect(),
                ..Default::default()
            },
            3000,
        );

        let outcome = f
            .coordinator
            .run(&f.window, f.source.path(), "stream", true)
            .await
            .unwrap();

        let RunOutcome::DryRun(summary) = outcome else {
            panic!("expected dry run");
        };
        assert_eq!(summary.record_count, 8);
        assert_eq!(summary.sample.len(), 5);
        assert_eq!(summary.total_value, ValueTotal::Exact(Decimal::from(4)));
        assert!(f.sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_rows_is_empty_success() {
        let f = fixture(
            FakeWarehouse {
                rows: vec![row(None, "2024-01-01T00:10:00Z", 1.0)],
                ..Default::default()
            },
            3000,
        );

        let outcome = f
            .coordinator
            .run(&f.window, f.source.path(), "stream", false)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Empty { skipped_rows: 1 }));
        assert!(f.sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn warehouse_closed_on_failure() {
        let f = fixture(
            FakeWarehouse {
                fail_script: true,
                ..Default::default()
            },
            3000,
        );

        let err = f
            .coordinator
            .run(&f.window, f.source.path(), "stream", false)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Warehouse(_)));
        assert_eq!(f.warehouse.closed.load(Ordering::SeqCst), 1);
        assert_eq!(f.warehouse.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_source_is_config_error() {
        let f = fixture(FakeWarehouse::default(), 3000);
        let err = f
            .coordinator
            .run(&f.window, Path::new("/nonexistent/query.sql"), "stream", false)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Config(_)));
        assert!(f.warehouse.calls.lock().unwrap().is_empty());
    }
}
