//! 배치 단위 전체 종목 수집.
//!
//! 종목 목록(코드 순)을 `batch_size`개씩 나눠 순서대로 처리합니다.
//!
//! - 종목 경계마다 중단 요청을 확인하고, 배치 간 대기도 중단 요청으로 끊습니다.
//! - 종목 하나의 오류나 패닉은 그 종목의 실패로 기록하고 다음 종목으로 넘어갑니다.
//! - `memory_check_every`개마다 메모리를 확인하고 한도를 넘으면 DB 세션을 재생성합니다.
//! - `session_recycle_every`개마다 DB 세션을 무조건 재생성합니다.
//! - 배치가 끝날 때마다 체크포인트를 남겨 `resume`으로 이어서 수집할 수 있습니다.

use chrono::NaiveDate;
use futures::FutureExt;
use investor_core::{CollectionPhase, InstrumentRef};
use investor_data::{CheckpointStatus, PageSource, TradingStore};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::bootstrap::initialize_stock_list;
use super::cutoff::{today_kst, CutoffScanner};
use super::instrument_collect::{InstrumentCollector, StopReason};
use super::persist::PersistenceWriter;
use crate::config::CollectConfig;
use crate::error::{CollectorError, Result};
use crate::memory::{MemoryProbe, ProcessMemoryProbe};
use crate::run_status::RunStatusHandle;
use crate::CollectionStats;

/// 체크포인트 워크플로우 이름.
pub const WORKFLOW_NAME: &str = "investor_trading_collect";

/// 한 번의 실행 옵션.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub years: u32,
    pub max_pages: u32,
    pub resume: bool,
}

impl RunOptions {
    pub fn from_config(config: &CollectConfig) -> Self {
        Self {
            years: config.default_years,
            max_pages: config.default_max_pages,
            resume: config.resume,
        }
    }
}

/// 종목 하나의 처리 결과.
struct InstrumentResult {
    no_data: bool,
    inserted: u64,
    skipped_existing: u64,
}

pub struct BatchOrchestrator {
    source: Arc<dyn PageSource>,
    store: Arc<dyn TradingStore>,
    probe: Arc<dyn MemoryProbe>,
    status: RunStatusHandle,
    config: CollectConfig,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn TradingStore>,
        status: RunStatusHandle,
        config: CollectConfig,
    ) -> Self {
        Self {
            source,
            store,
            probe: Arc::new(ProcessMemoryProbe),
            status,
            config,
        }
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// 전체 수집을 실행합니다.
    ///
    /// 호출 전에 `RunStatusHandle::begin`으로 실행이 등록되어 있어야 합니다.
    /// 준비 단계(기본 종목 등록, 종목 목록 조회)가 실패하면 `error` 단계로 끝내고 에러를 반환합니다.
    pub async fn run(&self, options: RunOptions, cancel: CancellationToken) -> Result<CollectionStats> {
        let start = Instant::now();
        info!(
            years = options.years,
            max_pages = options.max_pages,
            resume = options.resume,
            "투자자 매매동향 수집 시작"
        );

        let instruments = match self.prepare(options.resume).await {
            Ok(instruments) => instruments,
            Err(e) => {
                error!(error = %e, "수집 준비 실패");
                self.status
                    .finish(CollectionPhase::Error, 0, Some(e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let total = instruments.len();
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<&[InstrumentRef]> = instruments.chunks(batch_size).collect();
        self.status.start_collecting(total, batches.len()).await;

        let mut stats = CollectionStats::new(total);
        let today = today_kst();
        let scanner = CutoffScanner::years_before(today, options.years);
        let collector = InstrumentCollector::new(
            self.source.as_ref(),
            self.config.page_delay(),
            self.config.page_retry(),
        );
        let writer = PersistenceWriter::new(self.store.clone(), self.config.commit_retry());
        let mut last_code: Option<&str> = None;

        info!(
            total,
            batches = batches.len(),
            batch_size,
            cutoff = %scanner.cutoff(),
            "배치 수집 시작"
        );

        'batches: for (idx, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            stats.batches += 1;
            self.status.set_batch(idx + 1).await;
            info!(
                batch = idx + 1,
                batch_count = batches.len(),
                size = batch.len(),
                "배치 처리 시작"
            );

            for instrument in batch.iter() {
                if cancel.is_cancelled() {
                    break 'batches;
                }

                let label = instrument.label();
                self.status.set_current(&label).await;

                let result = AssertUnwindSafe(self.process_instrument(
                    &collector,
                    &writer,
                    instrument,
                    scanner,
                    options.max_pages,
                    today,
                ))
                .catch_unwind()
                .await;

                match result {
                    Ok(Ok(done)) => {
                        stats.success += 1;
                        if done.no_data {
                            stats.no_data += 1;
                        }
                        stats.new_records += done.inserted;
                        stats.duplicate_records += done.skipped_existing;
                        self.status.record_success(done.no_data, done.inserted).await;
                    }
                    Ok(Err(e)) => {
                        stats.failed += 1;
                        error!(stock = %label, error = %e, "종목 수집 실패");
                        self.status.record_failure(&label, &e.to_string()).await;
                    }
                    Err(payload) => {
                        stats.failed += 1;
                        let reason = panic_message(payload.as_ref());
                        error!(stock = %label, reason = %reason, "종목 처리 중 패닉");
                        self.status.record_failure(&label, &reason).await;
                    }
                }
                last_code = Some(instrument.code.as_str());

                self.maintain(stats.processed(), &mut stats).await;

                let delay = self.config.instrument_delay();
                if !delay.is_zero() && stats.processed() < total {
                    tokio::time::sleep(delay).await;
                }
            }

            if let Some(code) = last_code {
                self.checkpoint(code, stats.processed(), CheckpointStatus::Running)
                    .await;
            }

            if idx + 1 < batches.len() {
                stats.batch_waits += 1;
                let delay = self.config.batch_delay();
                info!(
                    batch = idx + 1,
                    delay_secs = delay.as_secs(),
                    processed = stats.processed(),
                    "배치 완료, 다음 배치 대기"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("배치 대기 중 중단 요청 수신");
                        break 'batches;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        stats.skipped = total - stats.processed();
        stats.cancelled = cancel.is_cancelled() && stats.skipped > 0;
        stats.elapsed = start.elapsed();

        let (phase, checkpoint_status) = if stats.cancelled {
            (CollectionPhase::Cancelled, CheckpointStatus::Interrupted)
        } else {
            (CollectionPhase::Completed, CheckpointStatus::Completed)
        };
        if let Some(code) = last_code {
            self.checkpoint(code, stats.processed(), checkpoint_status)
                .await;
        }
        self.status.finish(phase, stats.skipped, None).await;
        stats.log_summary("투자자 매매동향 수집");

        Ok(stats)
    }

    /// 기본 종목 등록 후 수집 대상 목록을 만듭니다.
    async fn prepare(&self, resume: bool) -> Result<Vec<InstrumentRef>> {
        if self.config.bootstrap_defaults {
            initialize_stock_list(self.store.as_ref()).await?;
        }

        let mut instruments = self.store.list_instruments().await?;
        if instruments.is_empty() {
            return Err(CollectorError::Other("수집할 종목이 없습니다".to_string()));
        }
        instruments.sort_by(|a, b| a.code.cmp(&b.code));

        if resume {
            if let Some(last) = self.store.resume_point(WORKFLOW_NAME).await? {
                let before = instruments.len();
                instruments.retain(|i| i.code.as_str() > last.as_str());
                info!(
                    last_code = %last,
                    skipped = before - instruments.len(),
                    remaining = instruments.len(),
                    "체크포인트 이후부터 재개"
                );
            }
        }

        Ok(instruments)
    }

    async fn process_instrument(
        &self,
        collector: &InstrumentCollector<'_>,
        writer: &PersistenceWriter,
        instrument: &InstrumentRef,
        scanner: CutoffScanner,
        max_pages: u32,
        today: NaiveDate,
    ) -> Result<InstrumentResult> {
        let outcome = collector
            .collect(&instrument.code, scanner, max_pages, today)
            .await;

        if outcome.is_fetch_failure() {
            let reason = match &outcome.stop_reason {
                StopReason::FetchFailed(msg) => msg.clone(),
                other => format!("{:?}", other),
            };
            return Err(CollectorError::Other(format!("페이지 요청 실패: {}", reason)));
        }

        if outcome.discarded_rows > 0 {
            debug!(
                stock_code = %instrument.code,
                discarded = outcome.discarded_rows,
                "형식이 맞지 않는 행 제외"
            );
        }

        if outcome.is_empty() {
            info!(
                stock_code = %instrument.code,
                stop = ?outcome.stop_reason,
                "수집된 데이터 없음"
            );
            return Ok(InstrumentResult {
                no_data: true,
                inserted: 0,
                skipped_existing: 0,
            });
        }

        let report = writer
            .save(&instrument.code, &instrument.name, &outcome.flows)
            .await?;

        Ok(InstrumentResult {
            no_data: false,
            inserted: report.inserted,
            skipped_existing: report.skipped_existing as u64,
        })
    }

    /// 주기적인 메모리 확인과 세션 재생성.
    async fn maintain(&self, processed: usize, stats: &mut CollectionStats) {
        let check_every = self.config.memory_check_every;
        if check_every > 0 && processed % check_every == 0 {
            if let Some(sample) = self.probe.sample() {
                debug!(
                    processed,
                    rss_mb = sample.rss_bytes / (1024 * 1024),
                    used_pct = format!("{:.1}", sample.used_pct),
                    "메모리 사용량 확인"
                );
                if sample.used_pct > self.config.memory_limit_pct {
                    warn!(
                        used_pct = format!("{:.1}", sample.used_pct),
                        limit_pct = self.config.memory_limit_pct,
                        "메모리 사용량 한도 초과, 정리 수행"
                    );
                    self.reset_session("메모리 정리").await;
                    stats.memory_cleanups += 1;
                    self.status.record_cleanup().await;
                }
            }
        }

        let recycle_every = self.config.session_recycle_every;
        if recycle_every > 0 && processed % recycle_every == 0 {
            info!(processed, "주기적 DB 세션 재생성");
            self.reset_session("주기적 재생성").await;
            stats.session_recycles += 1;
            self.status.record_session_recycle().await;
        }
    }

    async fn reset_session(&self, reason: &str) {
        if let Err(e) = self.store.reset_session().await {
            warn!(reason, error = %e, "DB 세션 재생성 실패");
        }
    }

    async fn checkpoint(&self, last_code: &str, processed: usize, status: CheckpointStatus) {
        if let Err(e) = self
            .store
            .save_checkpoint(WORKFLOW_NAME, last_code, processed, status)
            .await
        {
            warn!(last_code, error = %e, "체크포인트 저장 실패");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("패닉: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("패닉: {}", msg)
    } else {
        "패닉: 알 수 없는 원인".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemoryProbe;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use investor_data::{MemoryTradingStore, PageFetch};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 모든 종목에 최근 2거래일을 돌려주는 페이지 소스.
    struct StubSource {
        markup: String,
        cancel_on: Option<(String, CancellationToken)>,
        panic_on: Option<String>,
        no_data_for: Vec<String>,
        fetches: AtomicUsize,
    }

    impl StubSource {
        fn new() -> Self {
            let today = today_kst();
            let rows: String = [1, 2]
                .iter()
                .map(|days| {
                    let date = today - ChronoDuration::days(*days);
                    format!(
                        "<tr><td>{}</td><td>50,000</td><td>0</td><td>0%</td><td>10</td><td>+300</td><td>-100</td></tr>",
                        date.format("%Y.%m.%d")
                    )
                })
                .collect();
            Self {
                markup: format!("<table>{}</table>", rows),
                cancel_on: None,
                panic_on: None,
                no_data_for: Vec::new(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for StubSource {
        async fn fetch_page(&self, code: &str, _page: u32) -> investor_data::Result<PageFetch> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some((target, token)) = &self.cancel_on {
                if target == code {
                    token.cancel();
                }
            }
            if self.panic_on.as_deref() == Some(code) {
                panic!("표 구조 이상");
            }
            if self.no_data_for.iter().any(|c| c == code) {
                return Ok(PageFetch::NoData { status: 404 });
            }
            Ok(PageFetch::Markup(self.markup.clone()))
        }
    }

    fn instruments(count: usize) -> Vec<InstrumentRef> {
        (1..=count)
            .map(|i| InstrumentRef::new(format!("{:06}", i), format!("종목{}", i)))
            .collect()
    }

    fn config() -> CollectConfig {
        CollectConfig {
            bootstrap_defaults: false,
            ..CollectConfig::without_delays()
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            years: 1,
            max_pages: 5,
            resume: false,
        }
    }

    async fn orchestrator(
        source: StubSource,
        store: Arc<MemoryTradingStore>,
        config: CollectConfig,
    ) -> (BatchOrchestrator, RunStatusHandle) {
        let status = RunStatusHandle::new(config.failure_list_limit);
        status.begin("test-run", 1, 5).await.unwrap();
        let orchestrator =
            BatchOrchestrator::new(Arc::new(source), store, status.clone(), config)
                .with_memory_probe(Arc::new(FixedMemoryProbe(None)));
        (orchestrator, status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_and_inter_batch_waits() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(120)));
        let config = CollectConfig {
            batch_delay_secs: 30,
            ..config()
        };
        let (orchestrator, status) = orchestrator(StubSource::new(), store.clone(), config).await;

        let started = tokio::time::Instant::now();
        let stats = orchestrator.run(options(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.batches, 3);
        assert_eq!(stats.batch_waits, 2);
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(90));
        assert_eq!(stats.success, 120);
        assert_eq!(stats.new_records, 240);
        assert_eq!(store.record_count(), 240);

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.current_phase, CollectionPhase::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.batch_count, 3);
        assert!(!snapshot.is_running);
    }

    #[tokio::test]
    async fn test_second_run_inserts_nothing() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(3)));
        let (first, _) = orchestrator(StubSource::new(), store.clone(), config()).await;
        first.run(options(), CancellationToken::new()).await.unwrap();

        let (second, _) = orchestrator(StubSource::new(), store.clone(), config()).await;
        let stats = second.run(options(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.success, 3);
        assert_eq!(stats.new_records, 0);
        assert_eq!(stats.duplicate_records, 6);
        assert_eq!(store.record_count(), 6);
    }

    #[tokio::test]
    async fn test_cancel_mid_batch() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(20)));
        let cancel = CancellationToken::new();
        let mut source = StubSource::new();
        source.cancel_on = Some(("000011".to_string(), cancel.clone()));
        let (orchestrator, status) = orchestrator(source, store.clone(), config()).await;

        let stats = orchestrator.run(options(), cancel).await.unwrap();

        // 중단 요청을 받은 종목까지는 끝까지 처리합니다.
        assert_eq!(stats.processed(), 11);
        assert_eq!(stats.skipped, 9);
        assert!(stats.cancelled);
        assert_eq!(stats.success + stats.failed + stats.skipped, stats.total);

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.current_phase, CollectionPhase::Cancelled);
        assert_eq!(snapshot.skipped_count, 9);

        let (code, processed, checkpoint) = store.checkpoint(WORKFLOW_NAME).unwrap();
        assert_eq!(code, "000011");
        assert_eq!(processed, 11);
        assert_eq!(checkpoint, CheckpointStatus::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_batch_wait_short() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(4)));
        let cancel = CancellationToken::new();
        let config = CollectConfig {
            batch_size: 2,
            batch_delay_secs: 3600,
            ..config()
        };
        let (orchestrator, status) = orchestrator(StubSource::new(), store, config).await;

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let stats = orchestrator.run(options(), cancel).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(stats.processed(), 2);
        assert_eq!(status.snapshot().await.current_phase, CollectionPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_panic_and_no_data_do_not_stop_run() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(5)));
        let mut source = StubSource::new();
        source.panic_on = Some("000002".to_string());
        source.no_data_for = vec!["000004".to_string()];
        let (orchestrator, status) = orchestrator(source, store.clone(), config()).await;

        let stats = orchestrator.run(options(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.success, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.no_data, 1);

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.current_phase, CollectionPhase::Completed);
        assert_eq!(snapshot.failed_stocks.len(), 1);
        assert!(snapshot.failed_stocks[0].starts_with("000002 종목2: 패닉"));
    }

    #[tokio::test]
    async fn test_persist_failure_is_instrument_failure() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(2)));
        store.fail_next_inserts(1, false);
        let (orchestrator, _) = orchestrator(StubSource::new(), store.clone(), config()).await;

        let stats = orchestrator.run(options(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success, 1);
        assert_eq!(store.records("000001").len(), 0);
        assert_eq!(store.records("000002").len(), 2);
    }

    #[tokio::test]
    async fn test_memory_pressure_and_periodic_recycle() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(7)));
        let config = CollectConfig {
            memory_check_every: 2,
            memory_limit_pct: 80.0,
            session_recycle_every: 3,
            ..config()
        };
        let status = RunStatusHandle::new(10);
        status.begin("test-run", 1, 5).await.unwrap();
        let orchestrator =
            BatchOrchestrator::new(Arc::new(StubSource::new()), store.clone(), status.clone(), config)
                .with_memory_probe(Arc::new(FixedMemoryProbe(Some(95.0))));

        let stats = orchestrator.run(options(), CancellationToken::new()).await.unwrap();

        // 2, 4, 6번째에서 정리, 3, 6번째에서 재생성
        assert_eq!(stats.memory_cleanups, 3);
        assert_eq!(stats.session_recycles, 2);
        assert_eq!(store.session_resets(), 5);

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.memory_cleanups, 3);
        assert_eq!(snapshot.session_recycles, 2);
    }

    #[tokio::test]
    async fn test_setup_failure_sets_error_phase() {
        let store = Arc::new(MemoryTradingStore::new());
        store.fail_listing(true);
        let (orchestrator, status) = orchestrator(StubSource::new(), store, config()).await;

        assert!(orchestrator.run(options(), CancellationToken::new()).await.is_err());

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.current_phase, CollectionPhase::Error);
        assert!(!snapshot.is_running);
        assert!(snapshot.error_message.is_some());
    }

    #[tokio::test]
    async fn test_empty_universe_is_error() {
        let store = Arc::new(MemoryTradingStore::new());
        let (orchestrator, status) = orchestrator(StubSource::new(), store, config()).await;

        assert!(orchestrator.run(options(), CancellationToken::new()).await.is_err());
        assert_eq!(status.snapshot().await.current_phase, CollectionPhase::Error);
    }

    #[tokio::test]
    async fn test_bootstrap_then_collect_defaults() {
        let store = Arc::new(MemoryTradingStore::new());
        let config = CollectConfig {
            bootstrap_defaults: true,
            ..CollectConfig::without_delays()
        };
        let (orchestrator, _) = orchestrator(StubSource::new(), store.clone(), config).await;

        let stats = orchestrator.run(options(), CancellationToken::new()).await.unwrap();
        assert_eq!(stats.total, 50);
        assert_eq!(stats.batches, 1);
        assert_eq!(store.records("005930").len(), 2);
    }

    #[tokio::test]
    async fn test_resume_skips_checkpointed_codes() {
        let store = Arc::new(MemoryTradingStore::with_instruments(instruments(5)));
        store
            .save_checkpoint(WORKFLOW_NAME, "000003", 3, CheckpointStatus::Interrupted)
            .await
            .unwrap();
        let (orchestrator, _) = orchestrator(StubSource::new(), store.clone(), config()).await;

        let stats = orchestrator
            .run(
                RunOptions {
                    resume: true,
                    ..options()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats.total, 2);
        assert!(store.records("000001").is_empty());
        assert_eq!(store.records("000005").len(), 2);
        let (code, _, checkpoint) = store.checkpoint(WORKFLOW_NAME).unwrap();
        assert_eq!(code, "000005");
        assert_eq!(checkpoint, CheckpointStatus::Completed);
    }
}
