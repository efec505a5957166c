//! 변경 이력 저장소 (`data_history`).

use investor_core::{AuditEntry, AuditStats, NewAuditEntry};
use sqlx::{PgExecutor, PgPool};

use crate::error::Result;

pub struct HistoryRepository;

impl HistoryRepository {
    /// 감사 로그 한 건을 추가합니다. 트랜잭션 안에서도 호출할 수 있습니다.
    pub async fn record<'e, E>(executor: E, entry: &NewAuditEntry) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO data_history (table_name, record_id, action, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(entry.table_name)
        .bind(entry.record_id)
        .bind(entry.action.as_str())
        .bind(&entry.description)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    /// 최신순 목록. `table_name`이 있으면 해당 테이블만.
    pub async fn list(
        pool: &PgPool,
        table_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, table_name, record_id, action, description, created_at
            FROM data_history
            WHERE ($1::text IS NULL OR table_name = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(table_name)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    pub async fn stats(pool: &PgPool) -> Result<AuditStats> {
        let (total, creates, updates, deletes): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE action = 'CREATE'),
                COUNT(*) FILTER (WHERE action = 'UPDATE'),
                COUNT(*) FILTER (WHERE action = 'DELETE')
            FROM data_history
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(AuditStats {
            total,
            creates,
            updates,
            deletes,
        })
    }

    /// `days`일보다 오래된 이력을 삭제합니다.
    pub async fn clear_older_than(pool: &PgPool, days: i32) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM data_history WHERE created_at < NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
