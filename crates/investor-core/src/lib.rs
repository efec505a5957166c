//! # Investor Core
//!
//! 투자자별 순매수 수집기의 핵심 도메인 모델을 제공합니다.
//!
//! - 종목, 일별 매매 기록, 감사 로그 타입
//! - 수집 실행 단계(phase) 정의
//! - 입력 검증 헬퍼
//! - 설정 관리 및 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
