//! 누적 순매수 재계산.
//!
//! 항상 처음부터 다시 계산합니다. 종목의 전체 기록을 거래일 오름차순으로 읽고,
//! 시작값에서 일별 순매수(없으면 0)를 더해 가며 모든 행의 누적값을 한 번에 기록합니다.

use investor_core::{AccumBaseline, CumulativeUpdate, TradingRecord};
use investor_data::TradingStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::{CollectionStats, Result};

/// 오름차순 기록에 대한 누적값.
pub fn cumulative_totals(records: &[TradingRecord], seed: AccumBaseline) -> Vec<CumulativeUpdate> {
    let mut institution = seed.institution_accum_init;
    let mut foreigner = seed.foreigner_accum_init;

    records
        .iter()
        .map(|record| {
            institution += record.institution_net_buy.unwrap_or(0);
            foreigner += record.foreigner_net_buy.unwrap_or(0);
            CumulativeUpdate {
                id: record.id,
                institution_accum: institution,
                foreigner_accum: foreigner,
            }
        })
        .collect()
}

/// 한 종목 재계산 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccumulateReport {
    pub stock_code: String,
    pub records: u64,
    pub institution_accum: i64,
    pub foreigner_accum: i64,
}

/// 종목별 성공/실패.
#[derive(Debug, Clone, Serialize)]
pub struct AccumulateOutcome {
    pub stock_code: String,
    pub success: bool,
    pub records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Accumulator {
    store: Arc<dyn TradingStore>,
    seed_from_baseline: bool,
}

impl Accumulator {
    pub fn new(store: Arc<dyn TradingStore>, seed_from_baseline: bool) -> Self {
        Self {
            store,
            seed_from_baseline,
        }
    }

    pub async fn recompute(&self, stock_code: &str) -> Result<AccumulateReport> {
        let records = self.store.load_ascending(stock_code).await?;

        let seed = if self.seed_from_baseline {
            self.store
                .baseline(stock_code)
                .await?
                .unwrap_or_else(AccumBaseline::zero)
        } else {
            AccumBaseline::zero()
        };

        let updates = cumulative_totals(&records, seed);
        let (institution_accum, foreigner_accum) = updates
            .last()
            .map(|u| (u.institution_accum, u.foreigner_accum))
            .unwrap_or((seed.institution_accum_init, seed.foreigner_accum_init));

        let written = if updates.is_empty() {
            0
        } else {
            self.store.write_cumulative(stock_code, &updates).await?
        };

        info!(
            stock_code,
            records = written,
            institution_accum,
            foreigner_accum,
            "누적 순매수 재계산 완료"
        );

        Ok(AccumulateReport {
            stock_code: stock_code.to_string(),
            records: written,
            institution_accum,
            foreigner_accum,
        })
    }

    /// 기록이 있는 모든 종목을 재계산합니다. 종목마다 따로 커밋하고 실패해도 계속합니다.
    pub async fn recompute_all(&self) -> Result<(Vec<AccumulateOutcome>, CollectionStats)> {
        let start = Instant::now();
        let codes = self.store.distinct_codes().await?;
        let mut stats = CollectionStats::new(codes.len());
        let mut outcomes = Vec::with_capacity(codes.len());

        info!(count = codes.len(), "전체 누적 재계산 시작");

        for code in codes {
            match self.recompute(&code).await {
                Ok(report) => {
                    stats.success += 1;
                    outcomes.push(AccumulateOutcome {
                        stock_code: code,
                        success: true,
                        records: report.records,
                        error: None,
                    });
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(stock_code = %code, error = %e, "누적 재계산 실패");
                    outcomes.push(AccumulateOutcome {
                        stock_code: code,
                        success: false,
                        records: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        stats.elapsed = start.elapsed();
        Ok((outcomes, stats))
    }
}
