//! 수집 결과 저장.
//!
//! 이미 저장된 거래일을 먼저 걸러내고, 남은 행을 한 트랜잭션으로 저장합니다.
//! 일시적 오류면 DB 세션을 재생성한 뒤 다시 시도합니다.

use investor_core::DailyInvestorFlow;
use investor_data::{with_retry_recover, RetryConfig, TradingStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;

/// 한 종목 저장 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// 저장 후보 행 수
    pub candidates: usize,
    /// 이미 저장되어 있어 건너뛴 행 수
    pub skipped_existing: usize,
    /// 새로 저장된 행 수
    pub inserted: u64,
}

#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn TradingStore>,
    retry: RetryConfig,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn TradingStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn save(
        &self,
        stock_code: &str,
        stock_name: &str,
        flows: &[DailyInvestorFlow],
    ) -> Result<SaveReport> {
        let mut report = SaveReport {
            candidates: flows.len(),
            ..Default::default()
        };
        if flows.is_empty() {
            return Ok(report);
        }

        let dates: Vec<_> = flows.iter().map(|f| f.trade_date).collect();
        let existing = self.store.existing_dates(stock_code, &dates).await?;
        let fresh: Vec<DailyInvestorFlow> = flows
            .iter()
            .filter(|f| !existing.contains(&f.trade_date))
            .copied()
            .collect();
        report.skipped_existing = flows.len() - fresh.len();

        if fresh.is_empty() {
            debug!(stock_code, candidates = flows.len(), "새로 저장할 행 없음");
            return Ok(report);
        }

        let store = &self.store;
        report.inserted = with_retry_recover(
            &self.retry,
            |_| store.insert_flows(stock_code, stock_name, &fresh),
            |e| {
                let e = e.to_string();
                async move {
                    warn!(stock_code, error = %e, "저장 실패, DB 세션 재생성");
                    if let Err(reset_err) = store.reset_session().await {
                        warn!(stock_code, error = %reset_err, "DB 세션 재생성 실패");
                    }
                }
            },
        )
        .await?;

        info!(
            stock_code,
            stock_name,
            inserted = report.inserted,
            skipped = report.skipped_existing,
            "매매 기록 저장 완료"
        );
        Ok(report)
    }
}
