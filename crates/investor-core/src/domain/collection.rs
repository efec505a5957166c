//! 수집 실행 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 수집 실행 단계.
///
/// `idle → initializing → collecting → {completed | cancelled | error}`,
/// 중단 요청 직후에는 일시적으로 `stopping`이 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionPhase {
    #[default]
    Idle,
    Initializing,
    Collecting,
    Stopping,
    Completed,
    Cancelled,
    Error,
}

impl CollectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionPhase::Idle => "idle",
            CollectionPhase::Initializing => "initializing",
            CollectionPhase::Collecting => "collecting",
            CollectionPhase::Stopping => "stopping",
            CollectionPhase::Completed => "completed",
            CollectionPhase::Cancelled => "cancelled",
            CollectionPhase::Error => "error",
        }
    }

    /// 실행이 끝난 단계인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollectionPhase::Completed | CollectionPhase::Cancelled | CollectionPhase::Error
        )
    }
}

impl fmt::Display for CollectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수집 실행 스냅샷. 상태 조회 API가 그대로 직렬화합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRun {
    pub run_id: Option<String>,
    pub is_running: bool,
    pub current_phase: CollectionPhase,
    /// "코드 종목명"
    pub current_stock: String,
    /// 0..=100
    pub progress: u8,
    pub total_stocks: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// 중단으로 처리하지 못한 종목 수
    pub skipped_count: usize,
    /// 성공 중 데이터가 없었던 종목 수
    pub no_data_count: usize,
    pub new_records: u64,
    pub current_batch: usize,
    pub batch_count: usize,
    pub memory_cleanups: u32,
    pub session_recycles: u32,
    /// "코드 종목명: 사유" (개수 제한)
    pub failed_stocks: Vec<String>,
    pub years: Option<u32>,
    pub max_pages: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// 조회 시점에 계산되는 경과 시간 (초)
    pub elapsed_secs: Option<i64>,
    pub error_message: Option<String>,
}

impl CollectionRun {
    /// 처리한 종목 수 (성공 + 실패).
    pub fn processed(&self) -> usize {
        self.success_count + self.failed_count
    }

    /// 경과 시간을 채운 사본을 반환합니다.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Self {
        let mut snapshot = self.clone();
        snapshot.elapsed_secs = self
            .start_time
            .map(|start| (self.end_time.unwrap_or(now) - start).num_seconds());
        snapshot
    }
}
