//! 공유 수집 상태.
//!
//! 오케스트레이터가 쓰고 상태 조회 API가 읽습니다. 전역 변수 대신 핸들을 주입합니다.

use chrono::Utc;
use investor_core::{CollectionPhase, CollectionRun};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CollectorError, Result};

#[derive(Clone)]
pub struct RunStatusHandle {
    inner: Arc<RwLock<CollectionRun>>,
    failure_limit: usize,
}

impl RunStatusHandle {
    pub fn new(failure_limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CollectionRun::default())),
            failure_limit,
        }
    }

    /// 경과 시간이 채워진 현재 상태.
    pub async fn snapshot(&self) -> CollectionRun {
        self.inner.read().await.snapshot_at(Utc::now())
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.is_running
    }

    /// 새 실행을 시작합니다. 이미 실행 중이면 거부합니다.
    pub async fn begin(&self, run_id: &str, years: u32, max_pages: u32) -> Result<()> {
        let mut run = self.inner.write().await;
        if run.is_running {
            return Err(CollectorError::AlreadyRunning);
        }
        *run = CollectionRun {
            run_id: Some(run_id.to_string()),
            is_running: true,
            current_phase: CollectionPhase::Initializing,
            current_stock: "종목 목록 초기화 중".to_string(),
            years: Some(years),
            max_pages: Some(max_pages),
            start_time: Some(Utc::now()),
            ..Default::default()
        };
        Ok(())
    }

    /// 실행 중이 아닐 때만 초기 상태로 되돌립니다.
    pub async fn reset(&self) -> Result<()> {
        let mut run = self.inner.write().await;
        if run.is_running {
            return Err(CollectorError::AlreadyRunning);
        }
        *run = CollectionRun::default();
        Ok(())
    }

    pub async fn set_phase(&self, phase: CollectionPhase) {
        self.inner.write().await.current_phase = phase;
    }

    /// 실행 중일 때만 `stopping`으로 바꿉니다.
    pub async fn mark_stopping(&self) -> Result<()> {
        let mut run = self.inner.write().await;
        if !run.is_running {
            return Err(CollectorError::NotRunning);
        }
        if !run.current_phase.is_terminal() {
            run.current_phase = CollectionPhase::Stopping;
        }
        Ok(())
    }

    pub async fn start_collecting(&self, total: usize, batch_count: usize) {
        let mut run = self.inner.write().await;
        // 중단 요청이 먼저 들어왔다면 단계를 덮어쓰지 않습니다.
        if run.current_phase != CollectionPhase::Stopping {
            run.current_phase = CollectionPhase::Collecting;
        }
        run.current_stock.clear();
        run.total_stocks = total;
        run.batch_count = batch_count;
    }

    pub async fn set_batch(&self, batch: usize) {
        self.inner.write().await.current_batch = batch;
    }

    pub async fn set_current(&self, label: &str) {
        let mut run = self.inner.write().await;
        run.current_stock = label.to_string();
    }

    pub async fn record_success(&self, no_data: bool, new_records: u64) {
        let mut run = self.inner.write().await;
        run.success_count += 1;
        if no_data {
            run.no_data_count += 1;
        }
        run.new_records += new_records;
        refresh_progress(&mut run);
    }

    /// 실패 종목은 `failure_limit`개까지만 보관합니다.
    pub async fn record_failure(&self, label: &str, reason: &str) {
        let mut run = self.inner.write().await;
        run.failed_count += 1;
        if run.failed_stocks.len() < self.failure_limit {
            run.failed_stocks.push(format!("{label}: {reason}"));
        }
        refresh_progress(&mut run);
    }

    pub async fn record_cleanup(&self) {
        self.inner.write().await.memory_cleanups += 1;
    }

    pub async fn record_session_recycle(&self) {
        self.inner.write().await.session_recycles += 1;
    }

    /// 종료 단계와 함께 실행을 마칩니다.
    pub async fn finish(&self, phase: CollectionPhase, skipped: usize, error: Option<String>) {
        let mut run = self.inner.write().await;
        run.is_running = false;
        run.current_phase = phase;
        run.skipped_count = skipped;
        run.end_time = Some(Utc::now());
        run.current_stock = match phase {
            CollectionPhase::Completed => "데이터 수집 완료".to_string(),
            CollectionPhase::Cancelled => "데이터 수집 중단됨".to_string(),
            _ => String::new(),
        };
        if phase == CollectionPhase::Completed {
            run.progress = 100;
        }
        run.error_message = error;
    }
}

fn refresh_progress(run: &mut CollectionRun) {
    if run.total_stocks > 0 {
        let pct = run.processed() * 100 / run.total_stocks;
        run.progress = pct.min(100) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_rejects_concurrent_run() {
        let status = RunStatusHandle::new(10);
        status.begin("run-1", 3, 100).await.unwrap();
        assert!(matches!(
            status.begin("run-2", 3, 100).await,
            Err(CollectorError::AlreadyRunning)
        ));
        assert!(matches!(status.reset().await, Err(CollectorError::AlreadyRunning)));

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.current_phase, CollectionPhase::Initializing);
        assert_eq!(snapshot.run_id.as_deref(), Some("run-1"));
    }

    #[tokio::test]
    async fn test_progress_and_bounded_failures() {
        let status = RunStatusHandle::new(2);
        status.begin("run", 1, 10).await.unwrap();
        status.start_collecting(4, 1).await;

        status.record_success(false, 12).await;
        status.record_failure("000001 A", "timeout").await;
        status.record_failure("000002 B", "timeout").await;
        status.record_failure("000003 C", "timeout").await;

        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.failed_count, 3);
        assert_eq!(snapshot.failed_stocks.len(), 2);
        assert_eq!(snapshot.new_records, 12);
    }

    #[tokio::test]
    async fn test_stop_then_finish_allows_reset() {
        let status = RunStatusHandle::new(10);
        assert!(matches!(status.mark_stopping().await, Err(CollectorError::NotRunning)));

        status.begin("run", 1, 10).await.unwrap();
        status.mark_stopping().await.unwrap();
        status.start_collecting(5, 1).await;
        assert_eq!(status.snapshot().await.current_phase, CollectionPhase::Stopping);

        status.finish(CollectionPhase::Cancelled, 5, None).await;
        let snapshot = status.snapshot().await;
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.skipped_count, 5);
        assert!(snapshot.elapsed_secs.is_some());

        status.reset().await.unwrap();
        assert_eq!(status.snapshot().await, CollectionRun::default());
    }
}
