//! 종목 단위 페이지 순회.
//!
//! 1페이지부터 차례로 요청하고, 기간 경계/빈 페이지/응답 없음/최대 페이지에서 멈춥니다.
//! 결과는 거래일 기준으로 중복 제거(먼저 나온 행 유지) 후 최신순으로 정렬됩니다.

use chrono::NaiveDate;
use investor_core::DailyInvestorFlow;
use investor_data::provider::extract_rows;
use investor_data::{with_retry, PageFetch, PageSource, RetryConfig};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::cutoff::{CutoffScanner, ScanDecision};

/// 페이지 순회를 멈춘 이유.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 기준일보다 오래된 행 도달
    Cutoff,
    /// 행이 하나도 없는 페이지
    EmptyPage,
    /// 이전 페이지와 같은 거래일만 나온 페이지 (마지막 페이지 반복)
    RepeatedPage,
    /// 2xx가 아닌 응답
    NoData { status: u16 },
    /// 최대 페이지 수 도달
    MaxPages,
    /// 재시도 후에도 요청 실패
    FetchFailed(String),
}

/// 한 종목의 수집 결과.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// 최신순, 거래일 중복 없음
    pub flows: Vec<DailyInvestorFlow>,
    pub pages_fetched: u32,
    pub discarded_rows: usize,
    pub stop_reason: StopReason,
}

impl CollectOutcome {
    /// 저장할 행이 없는 경우. 오류가 아닌 정상 결과입니다.
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// 요청 실패로 아무 행도 얻지 못한 경우.
    pub fn is_fetch_failure(&self) -> bool {
        self.flows.is_empty() && matches!(self.stop_reason, StopReason::FetchFailed(_))
    }
}

pub struct InstrumentCollector<'a> {
    source: &'a dyn PageSource,
    page_delay: Duration,
    retry: RetryConfig,
}

impl<'a> InstrumentCollector<'a> {
    pub fn new(source: &'a dyn PageSource, page_delay: Duration, retry: RetryConfig) -> Self {
        Self {
            source,
            page_delay,
            retry,
        }
    }

    pub async fn collect(
        &self,
        stock_code: &str,
        scanner: CutoffScanner,
        max_pages: u32,
        today: NaiveDate,
    ) -> CollectOutcome {
        let mut flows = Vec::new();
        let mut seen = HashSet::new();
        let mut pages_fetched = 0;
        let mut discarded_rows = 0;

        let stop_reason = 'pages: {
            for page in 1..=max_pages {
                if page > 1 && !self.page_delay.is_zero() {
                    tokio::time::sleep(self.page_delay).await;
                }

                let fetched =
                    with_retry(&self.retry, |_| self.source.fetch_page(stock_code, page)).await;
                let markup = match fetched {
                    Ok(PageFetch::Markup(markup)) => markup,
                    Ok(PageFetch::NoData { status }) => break 'pages StopReason::NoData { status },
                    Err(e) => {
                        warn!(stock_code, page, error = %e, "페이지 요청 실패, 순회 종료");
                        break 'pages StopReason::FetchFailed(e.to_string());
                    }
                };
                pages_fetched += 1;

                let mut rows = extract_rows(&markup, today);
                let mut page_rows = 0;
                let mut page_new = 0;
                let mut hit_cutoff = false;

                for flow in rows.by_ref() {
                    if scanner.check(flow.trade_date) == ScanDecision::Stop {
                        hit_cutoff = true;
                        break;
                    }
                    page_rows += 1;
                    if seen.insert(flow.trade_date) {
                        flows.push(flow);
                        page_new += 1;
                    }
                }
                discarded_rows += rows.discarded();

                debug!(stock_code, page, page_rows, page_new, "페이지 처리");

                if hit_cutoff {
                    debug!(stock_code, page, cutoff = %scanner.cutoff(), "수집 기간 종료");
                    break 'pages StopReason::Cutoff;
                }
                if page_rows == 0 {
                    break 'pages StopReason::EmptyPage;
                }
                if page_new == 0 {
                    break 'pages StopReason::RepeatedPage;
                }
            }
            StopReason::MaxPages
        };

        // 먼저 나온 행을 유지했으므로 안정 정렬로 최신순만 맞춥니다.
        flows.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));

        CollectOutcome {
            flows,
            pages_fetched,
            discarded_rows,
            stop_reason,
        }
    }
}
