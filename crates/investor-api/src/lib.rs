//! 투자자 매매동향 수집기 REST API.
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`error`]: 통합 에러 응답

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiErrorResponse, ApiResult};
pub use routes::*;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
