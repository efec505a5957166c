//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 번의 수집 실행 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 전체 종목 수
    pub total: usize,
    /// 성공 (데이터 없음 포함)
    pub success: usize,
    /// 실패
    pub failed: usize,
    /// 중단으로 처리하지 않은 종목
    pub skipped: usize,
    /// 성공 중 데이터가 없었던 종목
    pub no_data: usize,
    /// 새로 저장된 행 수
    pub new_records: u64,
    /// 이미 저장되어 있어 건너뛴 행 수
    pub duplicate_records: u64,
    /// 처리한 배치 수
    pub batches: usize,
    /// 배치 간 대기 횟수
    pub batch_waits: usize,
    /// 메모리 정리 횟수
    pub memory_cleanups: u32,
    /// DB 세션 재생성 횟수
    pub session_recycles: u32,
    /// 중단 여부
    pub cancelled: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.success + self.failed
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.processed() == 0 {
            0.0
        } else {
            (self.success as f64 / self.processed() as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            failed = self.failed,
            skipped = self.skipped,
            no_data = self.no_data,
            new_records = self.new_records,
            duplicate_records = self.duplicate_records,
            batches = self.batches,
            memory_cleanups = self.memory_cleanups,
            session_recycles = self.session_recycles,
            cancelled = self.cancelled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_ignores_skipped() {
        let stats = CollectionStats {
            total: 10,
            success: 3,
            failed: 1,
            skipped: 6,
            ..Default::default()
        };
        assert_eq!(stats.processed(), 4);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }
}
