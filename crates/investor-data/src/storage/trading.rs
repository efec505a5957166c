//! 일별 매매 기록 저장소 (`stock_investor_trading`).

use chrono::NaiveDate;
use investor_core::{
    tables, AuditAction, CumulativeUpdate, DailyInvestorFlow, NewAuditEntry, NewTradingRecord,
    TradingRecord, TradingRecordUpdate, TrendUpdate,
};
use sqlx::PgPool;
use std::collections::HashSet;

use super::history::HistoryRepository;
use crate::error::{DataError, Result};

const SELECT_RECORD: &str = r#"
    SELECT id, stock_code, stock_name, trade_date, close_price,
           institution_net_buy, foreigner_net_buy, institution_accum, foreigner_accum,
           institution_trend_signal, institution_trend_score,
           foreigner_trend_signal, foreigner_trend_score,
           created_at, updated_at
    FROM stock_investor_trading
"#;

const RETURNING_RECORD: &str = r#"
    RETURNING id, stock_code, stock_name, trade_date, close_price,
              institution_net_buy, foreigner_net_buy, institution_accum, foreigner_accum,
              institution_trend_signal, institution_trend_score,
              foreigner_trend_signal, foreigner_trend_score,
              created_at, updated_at
"#;

pub struct TradingRepository;

impl TradingRepository {
    // ==================== 수집 파이프라인 ====================

    /// 주어진 날짜 중 이미 저장된 날짜를 한 번의 쿼리로 조회합니다.
    pub async fn existing_dates(
        pool: &PgPool,
        code: &str,
        dates: &[NaiveDate],
    ) -> Result<HashSet<NaiveDate>> {
        if dates.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(NaiveDate,)> = sqlx::query_as(
            r#"
            SELECT trade_date FROM stock_investor_trading
            WHERE stock_code = $1 AND trade_date = ANY($2)
            "#,
        )
        .bind(code)
        .bind(dates)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(d,)| d).collect())
    }

    /// 새 행들을 하나의 트랜잭션으로 저장하고 요약 감사 로그 한 건을 남깁니다.
    ///
    /// 누적값은 0으로 저장되며 누적 계산기가 나중에 채웁니다.
    pub async fn insert_flows(
        pool: &PgPool,
        code: &str,
        name: &str,
        flows: &[DailyInvestorFlow],
    ) -> Result<u64> {
        if flows.is_empty() {
            return Ok(0);
        }

        let dates: Vec<NaiveDate> = flows.iter().map(|f| f.trade_date).collect();
        let closes: Vec<Option<i64>> = flows.iter().map(|f| f.close_price).collect();
        let institution: Vec<Option<i64>> = flows.iter().map(|f| f.institution_net_buy).collect();
        let foreigner: Vec<Option<i64>> = flows.iter().map(|f| f.foreigner_net_buy).collect();

        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO stock_investor_trading
                (stock_code, stock_name, trade_date, close_price, institution_net_buy, foreigner_net_buy)
            SELECT $1, $2, t.trade_date, t.close_price, t.inst, t.frgn
            FROM UNNEST($3::date[], $4::bigint[], $5::bigint[], $6::bigint[])
                AS t(trade_date, close_price, inst, frgn)
            ON CONFLICT (stock_code, trade_date) DO NOTHING
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(&dates)
        .bind(&closes)
        .bind(&institution)
        .bind(&foreigner)
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected();
        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Create,
                format!("{} {}: 매매 기록 {}건 수집 저장", code, name, inserted),
            ),
        )
        .await?;
        tx.commit().await?;

        Ok(inserted)
    }

    /// 한 종목의 전체 기록 (거래일 오름차순).
    pub async fn list_ascending(pool: &PgPool, code: &str) -> Result<Vec<TradingRecord>> {
        let rows = sqlx::query_as::<_, TradingRecord>(&format!(
            "{} WHERE stock_code = $1 ORDER BY trade_date ASC",
            SELECT_RECORD
        ))
        .bind(code)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// 누적값 일괄 갱신 (단일 트랜잭션, 감사 로그 한 건).
    pub async fn write_cumulative(
        pool: &PgPool,
        code: &str,
        updates: &[CumulativeUpdate],
    ) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = updates.iter().map(|u| u.id).collect();
        let inst: Vec<i64> = updates.iter().map(|u| u.institution_accum).collect();
        let frgn: Vec<i64> = updates.iter().map(|u| u.foreigner_accum).collect();

        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE stock_investor_trading AS t
            SET institution_accum = u.inst,
                foreigner_accum = u.frgn,
                updated_at = NOW()
            FROM UNNEST($1::bigint[], $2::bigint[], $3::bigint[]) AS u(id, inst, frgn)
            WHERE t.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&inst)
        .bind(&frgn)
        .execute(&mut *tx)
        .await?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Update,
                format!("{}: 누적 순매수 재계산 {}건", code, result.rows_affected()),
            ),
        )
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// 기록이 있는 모든 종목코드.
    pub async fn distinct_codes(pool: &PgPool) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT stock_code FROM stock_investor_trading ORDER BY stock_code",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    // ==================== 일괄 삭제 ====================

    /// 코드 목록에 해당하는 기록을 삭제합니다. `None`이면 전체 삭제.
    pub async fn delete_by_codes(pool: &PgPool, codes: Option<&[String]>) -> Result<u64> {
        let mut tx = pool.begin().await?;
        let (result, description) = match codes {
            Some(codes) => {
                let result =
                    sqlx::query("DELETE FROM stock_investor_trading WHERE stock_code = ANY($1)")
                        .bind(codes)
                        .execute(&mut *tx)
                        .await?;
                (result, format!("매매 기록 일괄 삭제: {}", codes.join(",")))
            }
            None => {
                let result = sqlx::query("DELETE FROM stock_investor_trading")
                    .execute(&mut *tx)
                    .await?;
                (result, "매매 기록 전체 삭제".to_string())
            }
        };

        let deleted = result.rows_affected();
        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Delete,
                format!("{} ({}건)", description, deleted),
            ),
        )
        .await?;
        tx.commit().await?;

        Ok(deleted)
    }

    // ==================== CRUD ====================

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<TradingRecord>> {
        let row = sqlx::query_as::<_, TradingRecord>(&format!("{} WHERE id = $1", SELECT_RECORD))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// 최신 거래일순 페이지 조회.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<TradingRecord>> {
        let rows = sqlx::query_as::<_, TradingRecord>(&format!(
            "{} ORDER BY trade_date DESC, stock_code LIMIT $1 OFFSET $2",
            SELECT_RECORD
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// 종목별 조회 (거래일 내림차순, 선택적 기간).
    pub async fn list_by_code(
        pool: &PgPool,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TradingRecord>> {
        let rows = sqlx::query_as::<_, TradingRecord>(&format!(
            r#"{}
            WHERE stock_code = $1
              AND ($2::date IS NULL OR trade_date >= $2)
              AND ($3::date IS NULL OR trade_date <= $3)
            ORDER BY trade_date DESC"#,
            SELECT_RECORD
        ))
        .bind(code)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// 코드 또는 이름 부분 일치 검색.
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<TradingRecord>> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query_as::<_, TradingRecord>(&format!(
            "{} WHERE stock_code ILIKE $1 OR stock_name ILIKE $1 ORDER BY trade_date DESC LIMIT $2",
            SELECT_RECORD
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// 수동 등록. 같은 (종목코드, 거래일)이 있으면 `DuplicateError`.
    pub async fn create(pool: &PgPool, input: &NewTradingRecord) -> Result<TradingRecord> {
        let existing =
            Self::existing_dates(pool, &input.stock_code, &[input.trade_date]).await?;
        if !existing.is_empty() {
            return Err(DataError::DuplicateError(format!(
                "{} {} 기록이 이미 존재합니다",
                input.stock_code, input.trade_date
            )));
        }

        let mut tx = pool.begin().await?;
        let created = sqlx::query_as::<_, TradingRecord>(&format!(
            r#"
            INSERT INTO stock_investor_trading
                (stock_code, stock_name, trade_date, close_price, institution_net_buy, foreigner_net_buy)
            VALUES ($1, $2, $3, $4, $5, $6)
            {}"#,
            RETURNING_RECORD
        ))
        .bind(&input.stock_code)
        .bind(input.stock_name.trim())
        .bind(input.trade_date)
        .bind(input.close_price)
        .bind(input.institution_net_buy)
        .bind(input.foreigner_net_buy)
        .fetch_one(&mut *tx)
        .await?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Create,
                format!("매매 기록 등록: {} {}", created.stock_code, created.trade_date),
            )
            .with_record(created.id),
        )
        .await?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: &TradingRecordUpdate,
    ) -> Result<TradingRecord> {
        let mut tx = pool.begin().await?;
        let updated = sqlx::query_as::<_, TradingRecord>(&format!(
            r#"
            UPDATE stock_investor_trading
            SET stock_name = COALESCE($2, stock_name),
                close_price = COALESCE($3, close_price),
                institution_net_buy = COALESCE($4, institution_net_buy),
                foreigner_net_buy = COALESCE($5, foreigner_net_buy),
                updated_at = NOW()
            WHERE id = $1
            {}"#,
            RETURNING_RECORD
        ))
        .bind(id)
        .bind(input.stock_name.as_deref().map(str::trim))
        .bind(input.close_price)
        .bind(input.institution_net_buy)
        .bind(input.foreigner_net_buy)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DataError::NotFound(format!("매매 기록 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Update,
                format!("매매 기록 수정: {} {}", updated.stock_code, updated.trade_date),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// 추세 분석 결과 저장. 값은 해석하지 않습니다.
    pub async fn update_trend(pool: &PgPool, id: i64, trend: &TrendUpdate) -> Result<TradingRecord> {
        let mut tx = pool.begin().await?;
        let updated = sqlx::query_as::<_, TradingRecord>(&format!(
            r#"
            UPDATE stock_investor_trading
            SET institution_trend_signal = $2,
                institution_trend_score = $3,
                foreigner_trend_signal = $4,
                foreigner_trend_score = $5,
                updated_at = NOW()
            WHERE id = $1
            {}"#,
            RETURNING_RECORD
        ))
        .bind(id)
        .bind(&trend.institution_trend_signal)
        .bind(trend.institution_trend_score)
        .bind(&trend.foreigner_trend_signal)
        .bind(trend.foreigner_trend_score)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DataError::NotFound(format!("매매 기록 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Update,
                format!("추세 분석 갱신: {} {}", updated.stock_code, updated.trade_date),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<()> {
        let mut tx = pool.begin().await?;
        let deleted: Option<(String, NaiveDate)> = sqlx::query_as(
            "DELETE FROM stock_investor_trading WHERE id = $1 RETURNING stock_code, trade_date",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (code, date) =
            deleted.ok_or_else(|| DataError::NotFound(format!("매매 기록 id={}", id)))?;

        HistoryRepository::record(
            &mut *tx,
            &NewAuditEntry::new(
                tables::STOCK_INVESTOR_TRADING,
                AuditAction::Delete,
                format!("매매 기록 삭제: {} {}", code, date),
            )
            .with_record(id),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
