//! 웨어하우스 쿼리 실행 포트.
//!
//! 구현: `costfeed-storage::sqlite` (rusqlite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::row::Row;

/// 쿼리 실행 엔진: 임의의 SQL/DDL을 실행하고 행을 반환한다
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// 결과 없는 스크립트 실행 (뷰 정의 등, 여러 문장 가능)
    async fn execute_script(&self, sql: &str) -> Result<(), CoreError>;

    /// 위치 파라미터(`?`)를 바인딩해 쿼리 실행. 컬럼명은 소문자로 정규화된다.
    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, CoreError>;

    /// 타임스탬프 텍스트(컬럼 또는 `?`)를 시각 순서로 비교 가능한 식으로 변환.
    /// 기본값은 엔진의 네이티브 타임스탬프 비교를 그대로 사용한다.
    fn instant_expr(&self, expr: &str) -> String {
        expr.to_string()
    }

    /// 연결 확인
    async fn ping(&self) -> Result<(), CoreError> {
        self.query("SELECT 1 AS test", &[]).await.map(|_| ())
    }

    /// 연결 종료. 여러 번 호출해도 안전하다.
    fn close(&self);
}

/// 범위를 벗어나면 연결을 닫는 가드
pub struct WarehouseGuard<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> WarehouseGuard<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }
}

impl<'a> std::ops::Deref for WarehouseGuard<'a> {
    type Target = dyn Warehouse + 'a;

    fn deref(&self) -> &Self::Target {
        self.warehouse
    }
}

impl Drop for WarehouseGuard<'_> {
    fn drop(&mut self) {
        self.warehouse.close();
    }
}
