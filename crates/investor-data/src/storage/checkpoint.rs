//! 수집 작업 체크포인트 (`sync_checkpoint`).
//!
//! 배치마다 마지막으로 처리한 종목코드를 남겨 중단된 수집을 이어서 실행할 수 있게 합니다.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::Result;

/// 체크포인트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Running,
    /// 중단됨 (재개 가능)
    Interrupted,
    Completed,
    Idle,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
            Self::Idle => "idle",
        }
    }
}

pub struct CheckpointRepository;

impl CheckpointRepository {
    pub async fn save(
        pool: &PgPool,
        workflow: &str,
        last_code: &str,
        total_processed: i32,
        status: CheckpointStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_checkpoint (workflow_name, last_ticker, last_processed_at, total_processed, status, updated_at)
            VALUES ($1, $2, NOW(), $3, $4, NOW())
            ON CONFLICT (workflow_name)
            DO UPDATE SET
                last_ticker = EXCLUDED.last_ticker,
                last_processed_at = NOW(),
                total_processed = EXCLUDED.total_processed,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(workflow)
        .bind(last_code)
        .bind(total_processed)
        .bind(status.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 재개 지점. 실행 중이었거나 중단된 경우에만 마지막 종목코드를 반환합니다.
    pub async fn resume_point(pool: &PgPool, workflow: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT last_ticker
            FROM sync_checkpoint
            WHERE workflow_name = $1 AND status IN ('interrupted', 'running')
            "#,
        )
        .bind(workflow)
        .fetch_optional(pool)
        .await?;

        Ok(row
            .and_then(|(code,)| code)
            .filter(|code| !code.is_empty()))
    }
}
