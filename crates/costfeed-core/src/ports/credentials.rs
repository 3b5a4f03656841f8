//! 자격증명 조회 포트.
//!
//! 구현: `costfeed-network::secrets` (env, AWS, Azure, GCP)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::credentials::{CredentialBundle, SecretsProvider};

/// 이름 붙은 자격증명 번들 조회
///
/// 조회 실패는 재시도하지 않는다. 재시도 여부는 호출자가 결정한다.
/// 결과를 캐시하지 않으며, 번들 수명은 조회한 클라이언트의 수명과 같다.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// 번들 조회
    async fn resolve(&self, bundle_id: &str) -> Result<CredentialBundle, CoreError>;

    /// 활성 백엔드 종류
    fn provider(&self) -> SecretsProvider;
}
