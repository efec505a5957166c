//! 수집 실행 제어.
//!
//! API 핸들러와 CLI가 공유하는 진입점입니다. 수집은 별도 tokio 태스크에서 돌고,
//! 핸들러는 `RunStatusHandle`로 상태를 읽습니다.

use investor_core::validation::{validate_collect_years, validate_max_pages, validate_stock_code};
use investor_core::{CollectionRun, InstrumentRef, PurgeScope};
use investor_data::{PageSource, TradingStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::CollectConfig;
use crate::error::{CollectorError, Result};
use crate::memory::{MemoryProbe, ProcessMemoryProbe};
use crate::modules::{
    default_instruments, purge_records, AccumulateOutcome, Accumulator, BatchOrchestrator,
    PurgeReport, RunOptions,
};
use crate::run_status::RunStatusHandle;

/// 수집 시작 요청.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartRequest {
    pub years: Option<u32>,
    pub max_pages: Option<u32>,
    pub resume: Option<bool>,
}

pub struct CollectorService {
    source: Arc<dyn PageSource>,
    store: Arc<dyn TradingStore>,
    probe: Arc<dyn MemoryProbe>,
    config: CollectConfig,
    status: RunStatusHandle,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CollectorService {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn TradingStore>,
        config: CollectConfig,
    ) -> Self {
        let status = RunStatusHandle::new(config.failure_list_limit);
        Self {
            source,
            store,
            probe: Arc::new(ProcessMemoryProbe),
            config,
            status,
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    pub fn status_handle(&self) -> RunStatusHandle {
        self.status.clone()
    }

    pub async fn status(&self) -> CollectionRun {
        self.status.snapshot().await
    }

    /// 백그라운드 수집을 시작하고 실행 ID를 반환합니다.
    pub async fn start(&self, request: StartRequest) -> Result<String> {
        let options = RunOptions {
            years: request.years.unwrap_or(self.config.default_years),
            max_pages: request.max_pages.unwrap_or(self.config.default_max_pages),
            resume: request.resume.unwrap_or(self.config.resume),
        };
        validate_collect_years(options.years)?;
        validate_max_pages(options.max_pages)?;

        let run_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        {
            // stop()은 실행 표시 후 이 잠금을 기다리므로 항상 새 토큰을 취소합니다.
            let mut cancel = self.cancel.lock().await;
            self.status
                .begin(&run_id, options.years, options.max_pages)
                .await?;
            *cancel = Some(token.clone());
        }

        let orchestrator = BatchOrchestrator::new(
            self.source.clone(),
            self.store.clone(),
            self.status.clone(),
            self.config.clone(),
        )
        .with_memory_probe(self.probe.clone());

        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            match orchestrator.run(options, token).await {
                Ok(stats) => info!(
                    run_id = %task_run_id,
                    success = stats.success,
                    failed = stats.failed,
                    cancelled = stats.cancelled,
                    "수집 태스크 종료"
                ),
                Err(e) => error!(run_id = %task_run_id, error = %e, "수집 태스크 실패"),
            }
        });
        *self.task.lock().await = Some(handle);

        info!(
            run_id = %run_id,
            years = options.years,
            max_pages = options.max_pages,
            "데이터 수집 시작 요청"
        );
        Ok(run_id)
    }

    /// 중단을 요청합니다. 진행 중인 종목이 끝난 뒤 멈춥니다.
    pub async fn stop(&self) -> Result<()> {
        self.status.mark_stopping().await?;
        if let Some(token) = self.cancel.lock().await.as_ref() {
            token.cancel();
        }
        info!("데이터 수집 중단 요청");
        Ok(())
    }

    /// 실행 중이 아닐 때만 상태를 초기화합니다.
    pub async fn reset(&self) -> Result<()> {
        self.status.reset().await?;
        *self.cancel.lock().await = None;
        info!("수집 상태 초기화");
        Ok(())
    }

    /// 실행 중인 수집 태스크가 끝날 때까지 기다립니다.
    pub async fn wait(&self) {
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "수집 태스크 join 실패");
            }
        }
    }

    /// 한 종목 또는 기록이 있는 모든 종목의 누적값을 재계산합니다.
    pub async fn recompute(&self, stock_code: Option<&str>) -> Result<Vec<AccumulateOutcome>> {
        let accumulator = Accumulator::new(self.store.clone(), self.config.seed_from_baseline);
        match stock_code {
            Some(code) => {
                validate_stock_code(code)?;
                let report = accumulator.recompute(code).await?;
                Ok(vec![AccumulateOutcome {
                    stock_code: report.stock_code,
                    success: true,
                    records: report.records,
                    error: None,
                }])
            }
            None => {
                let (outcomes, stats) = accumulator.recompute_all().await?;
                stats.log_summary("누적 순매수 재계산");
                Ok(outcomes)
            }
        }
    }

    /// 매매 기록을 일괄 삭제합니다. 수집 중에는 거부합니다.
    pub async fn clear(&self, scope: &PurgeScope) -> Result<PurgeReport> {
        if self.status.is_running().await {
            return Err(CollectorError::AlreadyRunning);
        }
        purge_records(self.store.as_ref(), scope).await
    }

    pub fn default_stocks(&self) -> Vec<InstrumentRef> {
        default_instruments()
    }
}
