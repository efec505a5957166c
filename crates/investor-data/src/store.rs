//! 수집 파이프라인이 사용하는 저장소 경계.
//!
//! 수집기/누적 계산기는 `TradingStore`에만 의존합니다. 운영에서는 `PgTradingStore`,
//! 테스트에서는 `test-utils` 기능의 `MemoryTradingStore`를 씁니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use investor_core::{
    AccumBaseline, CumulativeUpdate, DailyInvestorFlow, InstrumentRef, PurgeScope, TradingRecord,
};
use std::collections::HashSet;

use crate::error::Result;
use crate::storage::{
    CheckpointRepository, CheckpointStatus, DbSession, StockRepository, TradingRepository,
};

#[async_trait]
pub trait TradingStore: Send + Sync {
    /// 수집 대상 종목 (코드 순).
    async fn list_instruments(&self) -> Result<Vec<InstrumentRef>>;

    /// 없는 종목만 등록하고 새로 등록된 수를 반환합니다.
    async fn ensure_instruments(&self, instruments: &[InstrumentRef]) -> Result<u64>;

    /// `dates` 중 이미 저장된 날짜.
    async fn existing_dates(&self, code: &str, dates: &[NaiveDate]) -> Result<HashSet<NaiveDate>>;

    /// 단일 트랜잭션 저장 + 요약 감사 로그. 저장된 행 수를 반환합니다.
    async fn insert_flows(&self, code: &str, name: &str, flows: &[DailyInvestorFlow])
        -> Result<u64>;

    /// 종목의 전체 기록 (거래일 오름차순).
    async fn load_ascending(&self, code: &str) -> Result<Vec<TradingRecord>>;

    /// 누적값 일괄 기록 (단일 트랜잭션).
    async fn write_cumulative(&self, code: &str, updates: &[CumulativeUpdate]) -> Result<u64>;

    async fn baseline(&self, code: &str) -> Result<Option<AccumBaseline>>;

    /// 기록이 있는 모든 종목코드.
    async fn distinct_codes(&self) -> Result<Vec<String>>;

    /// 범위에 해당하는 매매 기록 삭제. 삭제된 행 수를 반환합니다.
    async fn purge(&self, scope: &PurgeScope) -> Result<u64>;

    async fn save_checkpoint(
        &self,
        workflow: &str,
        last_code: &str,
        processed: usize,
        status: CheckpointStatus,
    ) -> Result<()>;

    async fn resume_point(&self, workflow: &str) -> Result<Option<String>>;

    /// DB 세션을 닫고 다시 엽니다.
    async fn reset_session(&self) -> Result<()>;
}

/// PostgreSQL 구현.
#[derive(Clone)]
pub struct PgTradingStore {
    session: DbSession,
}

impl PgTradingStore {
    pub fn new(session: DbSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &DbSession {
        &self.session
    }
}

#[async_trait]
impl TradingStore for PgTradingStore {
    async fn list_instruments(&self) -> Result<Vec<InstrumentRef>> {
        let pool = self.session.pool().await;
        let instruments = StockRepository::get_all(&pool).await?;
        Ok(instruments.iter().map(|i| i.as_ref_pair()).collect())
    }

    async fn ensure_instruments(&self, instruments: &[InstrumentRef]) -> Result<u64> {
        let pool = self.session.pool().await;
        StockRepository::insert_missing(&pool, instruments).await
    }

    async fn existing_dates(&self, code: &str, dates: &[NaiveDate]) -> Result<HashSet<NaiveDate>> {
        let pool = self.session.pool().await;
        TradingRepository::existing_dates(&pool, code, dates).await
    }

    async fn insert_flows(
        &self,
        code: &str,
        name: &str,
        flows: &[DailyInvestorFlow],
    ) -> Result<u64> {
        let pool = self.session.pool().await;
        TradingRepository::insert_flows(&pool, code, name, flows).await
    }

    async fn load_ascending(&self, code: &str) -> Result<Vec<TradingRecord>> {
        let pool = self.session.pool().await;
        TradingRepository::list_ascending(&pool, code).await
    }

    async fn write_cumulative(&self, code: &str, updates: &[CumulativeUpdate]) -> Result<u64> {
        let pool = self.session.pool().await;
        TradingRepository::write_cumulative(&pool, code, updates).await
    }

    async fn baseline(&self, code: &str) -> Result<Option<AccumBaseline>> {
        let pool = self.session.pool().await;
        StockRepository::baseline(&pool, code).await
    }

    async fn distinct_codes(&self) -> Result<Vec<String>> {
        let pool = self.session.pool().await;
        TradingRepository::distinct_codes(&pool).await
    }

    async fn purge(&self, scope: &PurgeScope) -> Result<u64> {
        let pool = self.session.pool().await;
        match scope {
            PurgeScope::All => TradingRepository::delete_by_codes(&pool, None).await,
            PurgeScope::Stock { stock_code } => {
                TradingRepository::delete_by_codes(&pool, Some(std::slice::from_ref(stock_code)))
                    .await
            }
            PurgeScope::Codes { stock_codes } => {
                TradingRepository::delete_by_codes(&pool, Some(stock_codes)).await
            }
        }
    }

    async fn save_checkpoint(
        &self,
        workflow: &str,
        last_code: &str,
        processed: usize,
        status: CheckpointStatus,
    ) -> Result<()> {
        let pool = self.session.pool().await;
        let processed = i32::try_from(processed).unwrap_or(i32::MAX);
        CheckpointRepository::save(&pool, workflow, last_code, processed, status).await
    }

    async fn resume_point(&self, workflow: &str) -> Result<Option<String>> {
        let pool = self.session.pool().await;
        CheckpointRepository::resume_point(&pool, workflow).await
    }

    async fn reset_session(&self) -> Result<()> {
        self.session.recycle().await
    }
}
