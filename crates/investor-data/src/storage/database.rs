//! PostgreSQL 연결 풀과 재생성 가능한 세션.

use investor_core::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{DataError, Result};

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout())
        .idle_timeout(config.idle_timeout())
}

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 연결 풀을 만들고 첫 연결까지 확인합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("데이터베이스 연결 중...");

        let pool = pool_options(config)
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("데이터베이스 연결 완료");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("마이그레이션 실행 중...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;

        info!("마이그레이션 완료");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        health_check(&self.pool).await
    }
}

async fn health_check(pool: &PgPool) -> Result<bool> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DataError::ConnectionError(e.to_string()))?;
    Ok(true)
}

/// 닫고 다시 만들 수 있는 DB 세션.
///
/// 오래 도는 수집 작업이 연결 상태 문제를 털어내기 위해 주기적으로 `recycle`합니다.
/// 호출자는 매번 `pool()`로 현재 풀을 받아 쓰고, 풀을 오래 붙잡고 있지 않아야 합니다.
#[derive(Clone)]
pub struct DbSession {
    inner: Arc<RwLock<PgPool>>,
    config: Arc<DatabaseConfig>,
}

impl DbSession {
    pub fn new(database: Database, config: DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(database.pool)),
            config: Arc::new(config),
        }
    }

    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        let database = Database::connect(&config).await?;
        Ok(Self::new(database, config))
    }

    /// 현재 연결 풀 (저렴한 복제본).
    pub async fn pool(&self) -> PgPool {
        self.inner.read().await.clone()
    }

    /// 기존 풀을 닫은 뒤 새 풀로 교체합니다.
    ///
    /// 새 풀은 지연 연결이므로 교체 자체는 네트워크 상태와 무관하게 성공합니다.
    pub async fn recycle(&self) -> Result<()> {
        let fresh = pool_options(&self.config)
            .connect_lazy(&self.config.url)
            .map_err(|e| DataError::ConfigError(e.to_string()))?;

        let mut guard = self.inner.write().await;
        guard.close().await;
        *guard = fresh;
        drop(guard);

        info!("DB 세션 재생성 완료");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        let pool = self.pool().await;
        let result = health_check(&pool).await;
        if let Err(e) = &result {
            warn!(error = %e, "DB 상태 확인 실패");
        }
        result
    }
}
