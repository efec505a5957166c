//! 인메모리 `TradingStore` (테스트용).
//!
//! 장애 주입(`fail_next_inserts`)과 세션 재생성 횟수 집계를 지원합니다.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use investor_core::{
    tables, AccumBaseline, AuditAction, CumulativeUpdate, DailyInvestorFlow, InstrumentRef,
    NewAuditEntry, PurgeScope, TradingRecord,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{DataError, Result};
use crate::storage::CheckpointStatus;
use crate::store::TradingStore;

#[derive(Default)]
struct MemoryState {
    instruments: Vec<InstrumentRef>,
    baselines: HashMap<String, AccumBaseline>,
    records: Vec<TradingRecord>,
    next_id: i64,
    audit: Vec<NewAuditEntry>,
    checkpoints: HashMap<String, (String, usize, CheckpointStatus)>,
}

#[derive(Default)]
pub struct MemoryTradingStore {
    state: Mutex<MemoryState>,
    pending_insert_failures: AtomicU32,
    permanent_insert_failure: AtomicBool,
    fail_listing: AtomicBool,
    insert_attempts: AtomicU32,
    session_resets: AtomicU32,
}

impl MemoryTradingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instruments(instruments: Vec<InstrumentRef>) -> Self {
        let store = Self::default();
        store.lock().instruments = instruments;
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 다음 `count`번의 저장을 실패시킵니다. `transient`면 연결 오류, 아니면 쿼리 오류.
    pub fn fail_next_inserts(&self, count: u32, transient: bool) {
        self.pending_insert_failures.store(count, Ordering::SeqCst);
        self.permanent_insert_failure
            .store(!transient, Ordering::SeqCst);
    }

    /// 종목 목록 조회를 실패시킵니다.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_baseline(&self, code: &str, baseline: AccumBaseline) {
        self.lock().baselines.insert(code.to_string(), baseline);
    }

    pub fn insert_attempts(&self) -> u32 {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub fn session_resets(&self) -> u32 {
        self.session_resets.load(Ordering::SeqCst)
    }

    pub fn records(&self, code: &str) -> Vec<TradingRecord> {
        let mut records: Vec<_> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.stock_code == code)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.trade_date);
        records
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.lock().audit.clone()
    }

    pub fn checkpoint(&self, workflow: &str) -> Option<(String, usize, CheckpointStatus)> {
        self.lock().checkpoints.get(workflow).cloned()
    }
}

#[async_trait]
impl TradingStore for MemoryTradingStore {
    async fn list_instruments(&self) -> Result<Vec<InstrumentRef>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DataError::QueryError("종목 목록 조회 실패".to_string()));
        }
        let mut instruments = self.lock().instruments.clone();
        instruments.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(instruments)
    }

    async fn ensure_instruments(&self, instruments: &[InstrumentRef]) -> Result<u64> {
        let mut state = self.lock();
        let mut inserted = 0;
        for instrument in instruments {
            if !state.instruments.iter().any(|i| i.code == instrument.code) {
                state.instruments.push(instrument.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn existing_dates(&self, code: &str, dates: &[NaiveDate]) -> Result<HashSet<NaiveDate>> {
        let wanted: HashSet<_> = dates.iter().copied().collect();
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| r.stock_code == code && wanted.contains(&r.trade_date))
            .map(|r| r.trade_date)
            .collect())
    }

    async fn insert_flows(
        &self,
        code: &str,
        name: &str,
        flows: &[DailyInvestorFlow],
    ) -> Result<u64> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);

        let pending = self.pending_insert_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_insert_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(if self.permanent_insert_failure.load(Ordering::SeqCst) {
                DataError::QueryError("value too long".to_string())
            } else {
                DataError::ConnectionError("server closed the connection".to_string())
            });
        }

        let mut state = self.lock();
        let now = Utc::now();
        let mut inserted = 0;
        for flow in flows {
            let duplicate = state
                .records
                .iter()
                .any(|r| r.stock_code == code && r.trade_date == flow.trade_date);
            if duplicate {
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.records.push(TradingRecord {
                id,
                stock_code: code.to_string(),
                stock_name: name.to_string(),
                trade_date: flow.trade_date,
                close_price: flow.close_price,
                institution_net_buy: flow.institution_net_buy,
                foreigner_net_buy: flow.foreigner_net_buy,
                institution_accum: 0,
                foreigner_accum: 0,
                institution_trend_signal: None,
                institution_trend_score: None,
                foreigner_trend_signal: None,
                foreigner_trend_score: None,
                created_at: now,
                updated_at: now,
            });
            inserted += 1;
        }
        state.audit.push(NewAuditEntry::new(
            tables::STOCK_INVESTOR_TRADING,
            AuditAction::Create,
            format!("{} {}: 매매 기록 {}건 수집 저장", code, name, inserted),
        ));
        Ok(inserted)
    }

    async fn load_ascending(&self, code: &str) -> Result<Vec<TradingRecord>> {
        Ok(self.records(code))
    }

    async fn write_cumulative(&self, code: &str, updates: &[CumulativeUpdate]) -> Result<u64> {
        let mut state = self.lock();
        let by_id: HashMap<i64, &CumulativeUpdate> = updates.iter().map(|u| (u.id, u)).collect();
        let mut written = 0;
        for record in state.records.iter_mut() {
            if let Some(update) = by_id.get(&record.id) {
                record.institution_accum = update.institution_accum;
                record.foreigner_accum = update.foreigner_accum;
                written += 1;
            }
        }
        state.audit.push(NewAuditEntry::new(
            tables::STOCK_INVESTOR_TRADING,
            AuditAction::Update,
            format!("{}: 누적 순매수 재계산 {}건", code, written),
        ));
        Ok(written)
    }

    async fn baseline(&self, code: &str) -> Result<Option<AccumBaseline>> {
        Ok(self.lock().baselines.get(code).copied())
    }

    async fn distinct_codes(&self) -> Result<Vec<String>> {
        let mut codes: Vec<String> = self
            .lock()
            .records
            .iter()
            .map(|r| r.stock_code.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        codes.sort();
        Ok(codes)
    }

    async fn purge(&self, scope: &PurgeScope) -> Result<u64> {
        let mut state = self.lock();
        let before = state.records.len();
        match scope {
            PurgeScope::All => state.records.clear(),
            PurgeScope::Stock { stock_code } => {
                state.records.retain(|r| &r.stock_code != stock_code)
            }
            PurgeScope::Codes { stock_codes } => {
                state.records.retain(|r| !stock_codes.contains(&r.stock_code))
            }
        }
        let deleted = (before - state.records.len()) as u64;
        state.audit.push(NewAuditEntry::new(
            tables::STOCK_INVESTOR_TRADING,
            AuditAction::Delete,
            format!("매매 기록 삭제: {} ({}건)", scope.describe(), deleted),
        ));
        Ok(deleted)
    }

    async fn save_checkpoint(
        &self,
        workflow: &str,
        last_code: &str,
        processed: usize,
        status: CheckpointStatus,
    ) -> Result<()> {
        self.lock().checkpoints.insert(
            workflow.to_string(),
            (last_code.to_string(), processed, status),
        );
        Ok(())
    }

    async fn resume_point(&self, workflow: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .checkpoints
            .get(workflow)
            .filter(|(code, _, status)| {
                !code.is_empty()
                    && matches!(
                        status,
                        CheckpointStatus::Interrupted | CheckpointStatus::Running
                    )
            })
            .map(|(code, _, _)| code.clone()))
    }

    async fn reset_session(&self) -> Result<()> {
        self.session_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(day: u32, inst: i64) -> DailyInvestorFlow {
        DailyInvestorFlow {
            trade_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close_price: Some(1000),
            institution_net_buy: Some(inst),
            foreigner_net_buy: None,
        }
    }

    #[tokio::test]
    async fn test_insert_skips_existing_natural_key() {
        let store = MemoryTradingStore::new();
        assert_eq!(
            store.insert_flows("005930", "삼성전자", &[flow(2, 1), flow(3, 2)]).await.unwrap(),
            2
        );
        assert_eq!(
            store.insert_flows("005930", "삼성전자", &[flow(3, 9), flow(4, 3)]).await.unwrap(),
            1
        );
        assert_eq!(store.record_count(), 3);
        assert_eq!(store.audit_entries().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryTradingStore::new();
        store.fail_next_inserts(1, true);

        let err = store.insert_flows("005930", "삼성전자", &[flow(2, 1)]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.insert_flows("005930", "삼성전자", &[flow(2, 1)]).await.is_ok());
        assert_eq!(store.insert_attempts(), 2);
    }
}
