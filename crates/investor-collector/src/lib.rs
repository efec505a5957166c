//! 네이버 금융 외국인/기관 순매매 수집기.
//!
//! 이 crate는 API 서버와 CLI가 함께 쓰는 수집 파이프라인을 제공합니다:
//! - 종목별 매매동향 페이지 순회와 기간 경계 판정
//! - 중복 제외 저장 (재시도 + DB 세션 재생성)
//! - 배치 단위 전체 종목 수집과 중단/재개
//! - 누적 순매수 재계산

pub mod config;
pub mod error;
pub mod memory;
pub mod modules;
pub mod run_status;
pub mod service;
pub mod stats;

pub use config::{CollectConfig, CollectorConfig};
pub use error::{CollectorError, Result};
pub use memory::{MemoryProbe, MemorySample, ProcessMemoryProbe};
pub use run_status::RunStatusHandle;
pub use service::{CollectorService, StartRequest};
pub use stats::CollectionStats;
