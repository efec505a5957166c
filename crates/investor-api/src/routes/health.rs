//! 헬스 체크 endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub collector: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down" | "not_configured")
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            message: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            status: "not_configured".to_string(),
            message: None,
        }
    }

    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }
}

/// 서버 생존 여부와 DB 상태.
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut overall_status = "healthy";
    let mut status_code = StatusCode::OK;

    let database_status = if state.db.is_some() {
        if state.is_db_healthy().await {
            ComponentStatus::up()
        } else {
            overall_status = "degraded";
            status_code = StatusCode::SERVICE_UNAVAILABLE;
            ComponentStatus::down("연결 실패")
        }
    } else {
        ComponentStatus::not_configured()
    };

    let run = state.collector.status().await;
    let collector_status = ComponentStatus::up_with_info(format!(
        "phase={}, progress={}%",
        run.current_phase.as_str(),
        run.progress
    ));

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            database: database_status,
            collector: collector_status,
        },
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}
