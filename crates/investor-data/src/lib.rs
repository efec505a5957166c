//! 매매동향 페이지 수집, 표 추출, PostgreSQL 저장소.
//!
//! # 구성
//!
//! - [`provider`]: 페이지 요청기와 행 추출기
//! - [`storage`]: 저장소(repository)와 재생성 가능한 DB 세션
//! - [`store`]: 수집 파이프라인용 저장소 경계 (`TradingStore`)
//! - [`retry`]: 일시적 오류 재시도

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod provider;
pub mod retry;
pub mod storage;
pub mod store;

pub use error::{DataError, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryTradingStore;
pub use provider::{NaverInvestorFetcher, PageFetch, PageSource};
pub use retry::{with_retry, with_retry_recover, RetryConfig, Retryable};
pub use storage::{
    CheckpointRepository, CheckpointStatus, Database, DbSession, HistoryRepository,
    StockRepository, TradingRepository,
};
pub use store::{PgTradingStore, TradingStore};
