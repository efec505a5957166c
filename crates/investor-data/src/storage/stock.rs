//! 종목 레지스트리 저장소 (`stock_list`).

use investor_core::{
    tables, AccumBaseline, AuditAction, Instrument, InstrumentRef, InstrumentUpdate,
    NewAuditEntry, NewInstrument,
};
use sqlx::PgPool;

use super::history::HistoryRepository;
use crate::error::{DataError, Result};

const SELECT_INSTRUMENT: &str = r#"
    SELECT id, stock_code, stock_name, init_date, institution_accum_init,
           foreigner_accum_init, created_at, updated_at
    FROM stock_list
"#;

pub struct StockRepository;

impl StockRepository {
    /// 전체 종목 (코드 순).
    pub async fn get_all(pool: &PgPool) -> Result<Vec<Instrument>> {
        let rows = sqlx::query_as::<_, Instrument>(&format!(
            "{} ORDER BY stock_code",
            SELECT_INSTRUMENT
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Instrument>> {
        let row = sqlx::query_as::<_, Instrument>(&format!("{} WHERE id = $1", SELECT_INSTRUMENT))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_code(pool: &PgPool, code: &str) -> Result<Option<Instrument>> {
        let row = sqlx::query_as::<_, Instrument>(&format!(
            "{} WHERE stock_code = $1",
            SELECT_INSTRUMENT
        ))
        .bind(code)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// 코드 또는 이름 부분 일치 검색.
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Instrument>> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query_as::<_, Instrument>(&format!(
            "{} WHERE stock_code ILIKE $1 OR stock_name ILIKE $1 ORDER BY stock_code LIMIT $2",
            SELECT_INSTRUMENT
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(pool: &PgPool, input: &NewInstrument) -> Result<Instrument> {
        if Self::get_by_code(pool, &input.stock_code).await?.is_some() {
            return Err(DataError::DuplicateError(format!(
                "이미 등록된 종목코드: {}",
                input.stock_code
            )));
        }

        let mut tx = pool.begin().await?;
        let created = sqlx::query_as::<_, Instrument>(
            r#"
            INSERT INTO stock_list (stock_code, stock_name, init_date, institution_accum_init, foreigner_accum_init)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, stock_code, stock_name, init_date, institution_accum_init,
                      foreigner_accum_init, created_at, updated_at
            "#,
        )
        .bind(&input.stock_code)
        .bind(input.stock_name.trim())
        .bind(input.init_date)
        .bind(input.institution_accum_init)
        .bind(input.foreigner_accum_init)
        .fetch_one(&mut *tx)
        .await?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_LIST,
                AuditAction::Create,
                format!("종목 등록: {}", created.label()),
            )
            .with_record(created.id),
        )
        .await?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn update(pool: &PgPool, id: i64, input: &InstrumentUpdate) -> Result<Instrument> {
        let mut tx = pool.begin().await?;
        let updated = sqlx::query_as::<_, Instrument>(
            r#"
            UPDATE stock_list
            SET stock_name = COALESCE($2, stock_name),
                init_date = COALESCE($3, init_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, stock_code, stock_name, init_date, institution_accum_init,
                      foreigner_accum_init, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.stock_name.as_deref().map(str::trim))
        .bind(input.init_date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DataError::NotFound(format!("종목 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_LIST,
                AuditAction::Update,
                format!("종목 수정: {}", updated.label()),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// 누적 기준값을 변경합니다 (관리자 작업).
    pub async fn update_baseline(
        pool: &PgPool,
        id: i64,
        baseline: AccumBaseline,
    ) -> Result<Instrument> {
        if !baseline.is_valid() {
            return Err(DataError::InvalidData(
                "누적 기준값은 0 이상이어야 합니다".to_string(),
            ));
        }

        let mut tx = pool.begin().await?;
        let updated = sqlx::query_as::<_, Instrument>(
            r#"
            UPDATE stock_list
            SET institution_accum_init = $2,
                foreigner_accum_init = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, stock_code, stock_name, init_date, institution_accum_init,
                      foreigner_accum_init, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(baseline.institution_accum_init)
        .bind(baseline.foreigner_accum_init)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DataError::NotFound(format!("종목 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_LIST,
                AuditAction::Update,
                format!(
                    "누적 기준값 변경: {} (기관 {}, 외국인 {})",
                    updated.label(),
                    baseline.institution_accum_init,
                    baseline.foreigner_accum_init
                ),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<()> {
        let mut tx = pool.begin().await?;
        let deleted: Option<(String, String)> = sqlx::query_as(
            "DELETE FROM stock_list WHERE id = $1 RETURNING stock_code, stock_name",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (code, name) = deleted.ok_or_else(|| DataError::NotFound(format!("종목 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_LIST,
                AuditAction::Delete,
                format!("종목 삭제: {} {}", code, name),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// 없는 종목만 등록합니다. 새로 등록된 수를 반환합니다.
    pub async fn insert_missing(pool: &PgPool, instruments: &[InstrumentRef]) -> Result<u64> {
        if instruments.is_empty() {
            return Ok(0);
        }

        let codes: Vec<&str> = instruments.iter().map(|i| i.code.as_str()).collect();
        let names: Vec<&str> = instruments.iter().map(|i| i.name.as_str()).collect();

        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO stock_list (stock_code, stock_name)
            SELECT code, name FROM UNNEST($1::text[], $2::text[]) AS t(code, name)
            ON CONFLICT (stock_code) DO NOTHING
            "#,
        )
        .bind(&codes)
        .bind(&names)
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected();
        if inserted > 0 {
            HistoryRepository::record(
                &mut *tx,
                &NewAuditEntry::new(
                    tables::STOCK_LIST,
                    AuditAction::Create,
                    format!("기본 종목 목록 초기화: {}개 등록", inserted),
                ),
            )
            .await?;
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// 해당 종목의 누적 기준값. 등록되지 않은 종목이면 `None`.
    pub async fn baseline(pool: &PgPool, code: &str) -> Result<Option<AccumBaseline>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT institution_accum_init, foreigner_accum_init FROM stock_list WHERE stock_code = $1",
        )
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(inst, frgn)| AccumBaseline {
            institution_accum_init: inst,
            foreigner_accum_init: frgn,
        }))
    }
}
