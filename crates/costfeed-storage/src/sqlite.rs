//! SQLite 웨어하우스 어댑터.
//!
//! `Warehouse` 포트 구현. 연결은 `close()` 전까지 유지되며,
//! 닫힌 뒤의 호출은 `CoreError::Warehouse`로 실패한다.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use costfeed_core::error::CoreError;
use costfeed_core::models::credentials::WarehouseLogin;
use costfeed_core::models::row::Row;
use costfeed_core::ports::warehouse::Warehouse;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite 웨어하우스: `Warehouse` 포트 구현
pub struct SqliteWarehouse {
    conn: Mutex<Option<Connection>>,
    label: String,
}

impl SqliteWarehouse {
    /// 파일 기반 웨어하우스 연결
    pub fn open(path: &Path, login: &WarehouseLogin, warehouse: &str) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Warehouse(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Warehouse(format!("PRAGMA 설정 실패: {e}")))?;

        let label = format!("{}@{}/{warehouse}", login.user, login.account);
        info!("웨어하우스 연결: {label} ({})", path.display());

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            label,
        })
    }

    /// 인메모리 웨어하우스 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Warehouse(format!("인메모리 SQLite 생성 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            label: ":memory:".to_string(),
        })
    }

    /// 연결 표시 이름 (비밀번호 제외)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 연결이 열려 있는지
    pub fn is_open(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Warehouse(format!("연결 잠금 실패: {e}")))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, CoreError> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| CoreError::Warehouse("연결이 이미 닫힘".to_string()))?;
        f(conn).map_err(|e| CoreError::Warehouse(e.to_string()))
    }
}

/// SQLite 값을 JSON 값으로 변환
fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(STANDARD.encode(b)),
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn execute_script(&self, sql: &str) -> Result<(), CoreError> {
        debug!("스크립트 실행 ({}자)", sql.len());
        self.with_conn(|conn| conn.execute_batch(sql))
    }

    /// TEXT 타임스탬프는 오프셋이 섞이면 문자열 순서가 시각 순서와 다르다
    fn instant_expr(&self, expr: &str) -> String {
        format!("julianday({expr})")
    }

    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, CoreError> {
        debug!("쿼리 실행 (파라미터 {}개)", params.len());

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|name| name.to_lowercase())
                .collect();

            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut map = Row::new();
                for (i, column) in columns.iter().enumerate() {
                    map.insert(column.clone(), to_json(row.get_ref(i)?));
                }
                out.push(map);
            }
            Ok(out)
        })
    }

    fn close(&self) {
        match self.conn.lock() {
            Ok(mut guard) => {
                if let Some(conn) = guard.take() {
                    if let Err((_, e)) = conn.close() {
                        warn!("웨어하우스 연결 종료 실패: {e}");
                    } else {
                        debug!("웨어하우스 연결 종료: {}", self.label);
                    }
                }
            }
            Err(e) => warn!("웨어하우스 연결 잠금 실패: {e}"),
        }
    }
}
