//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크
//! - `/api/v1/collector` - 수집 시작/중단/상태, 누적 재계산, 기록 삭제
//! - `/api/v1/stocks` - 종목 관리
//! - `/api/v1/trading` - 매매 기록 관리
//! - `/api/v1/history` - 변경 이력

pub mod collector;
pub mod health;
pub mod history;
pub mod stocks;
pub mod trading;

pub use collector::{collector_router, StartCollectionRequest};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use history::history_router;
pub use stocks::stocks_router;
pub use trading::trading_router;

use axum::Router;
use investor_core::validation::is_valid_stock_code;
use serde::Serialize;
use std::sync::Arc;
use validator::ValidationError;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/collector", collector_router())
        .nest("/api/v1/stocks", stocks_router())
        .nest("/api/v1/trading", trading_router())
        .nest("/api/v1/history", history_router())
}

/// 단순 성공 응답.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// 목록 응답.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

fn validate_code(value: &str) -> Result<(), ValidationError> {
    if !is_valid_stock_code(value) {
        return Err(ValidationError::new("invalid_stock_code")
            .with_message("종목코드는 6자리 숫자여야 합니다".into()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::create_api_router;
    use crate::state::{create_test_state, AppState};

    pub fn test_app() -> (Router, Arc<AppState>) {
        let state = Arc::new(create_test_state());
        (create_api_router().with_state(state.clone()), state)
    }

    pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
