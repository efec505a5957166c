//! 모든 핸들러에서 공유되는 애플리케이션 상태.

use investor_collector::CollectorService;
use investor_data::DbSession;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{db_unavailable, ApiResult};

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 재생성 가능한 DB 세션. 없으면 저장소 엔드포인트는 503을 반환합니다.
    pub db: Option<DbSession>,

    /// 수집 실행 제어 (시작/중단/상태)
    pub collector: Arc<CollectorService>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    pub fn new(collector: CollectorService) -> Self {
        Self {
            db: None,
            collector: Arc::new(collector),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// DB 세션 설정.
    pub fn with_db(mut self, db: DbSession) -> Self {
        self.db = Some(db);
        self
    }

    /// 현재 연결 풀. 세션이 없으면 503 응답.
    pub async fn pool(&self) -> ApiResult<PgPool> {
        match &self.db {
            Some(db) => Ok(db.pool().await),
            None => Err(db_unavailable()),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db {
            Some(db) => db.health_check().await.unwrap_or(false),
            None => false,
        }
    }
}

/// 테스트용 상태: DB 없이 인메모리 저장소와 404만 돌려주는 페이지 공급자를 씁니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use async_trait::async_trait;
    use investor_collector::memory::FixedMemoryProbe;
    use investor_collector::CollectConfig;
    use investor_core::InstrumentRef;
    use investor_data::{MemoryTradingStore, PageFetch, PageSource};

    struct NoDataSource;

    #[async_trait]
    impl PageSource for NoDataSource {
        async fn fetch_page(&self, _code: &str, _page: u32) -> investor_data::Result<PageFetch> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(PageFetch::NoData { status: 404 })
        }
    }

    let store = MemoryTradingStore::with_instruments(
        (1..=20)
            .map(|i| InstrumentRef::new(format!("{:06}", i), format!("종목{}", i)))
            .collect(),
    );
    let config = CollectConfig {
        bootstrap_defaults: false,
        ..CollectConfig::without_delays()
    };
    let collector = CollectorService::new(Arc::new(NoDataSource), Arc::new(store), config)
        .with_memory_probe(Arc::new(FixedMemoryProbe(None)));

    AppState::new(collector)
}
