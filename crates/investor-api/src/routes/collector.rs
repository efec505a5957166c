//! 데이터 수집 제어 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/collector/status` - 현재 실행 스냅샷
//! - `POST /api/v1/collector/start` - 백그라운드 수집 시작
//! - `POST /api/v1/collector/stop` - 수집 중단 요청
//! - `POST /api/v1/collector/reset` - 상태 초기화
//! - `GET /api/v1/collector/stocks` - 기본 종목 목록
//! - `POST /api/v1/collector/accumulate` - 누적 순매수 재계산
//! - `POST /api/v1/collector/clear` - 매매 기록 삭제

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use investor_collector::modules::{AccumulateOutcome, PurgeReport};
use investor_collector::StartRequest;
use investor_core::{CollectionRun, InstrumentRef, PurgeScope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{validate_code, ListResponse, MessageResponse};
use crate::error::{collector_error, validation_error, ApiResult};
use crate::state::AppState;

/// 수집 시작 요청. 비어 있는 필드는 서버 기본값을 씁니다.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartCollectionRequest {
    #[validate(range(
        min = 1,
        max = 10,
        message = "수집 기간은 1년 이상 10년 이하여야 합니다"
    ))]
    pub years: Option<u32>,

    #[validate(range(
        min = 1,
        max = 1000,
        message = "최대 페이지 수는 1 이상 1000 이하여야 합니다"
    ))]
    pub max_pages: Option<u32>,

    /// 마지막 체크포인트 이후부터 이어서 수집
    pub resume: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StartCollectionResponse {
    pub success: bool,
    pub run_id: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AccumulateRequest {
    #[validate(custom(function = "validate_code"))]
    pub stock_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccumulateResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<AccumulateOutcome>,
}

/// `GET /api/v1/collector/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<CollectionRun> {
    Json(state.collector.status().await)
}

/// `POST /api/v1/collector/start`
pub async fn start_collection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCollectionRequest>,
) -> ApiResult<Json<StartCollectionResponse>> {
    request.validate().map_err(validation_error)?;

    let run_id = state
        .collector
        .start(StartRequest {
            years: request.years,
            max_pages: request.max_pages,
            resume: request.resume,
        })
        .await
        .map_err(collector_error)?;

    Ok(Json(StartCollectionResponse {
        success: true,
        run_id,
        message: "데이터 수집을 시작했습니다".to_string(),
    }))
}

/// `POST /api/v1/collector/stop`
pub async fn stop_collection(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<MessageResponse>> {
    state.collector.stop().await.map_err(collector_error)?;
    Ok(Json(MessageResponse::ok(
        "중단을 요청했습니다. 진행 중인 종목이 끝나면 멈춥니다",
    )))
}

/// `POST /api/v1/collector/reset`
pub async fn reset_collection(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<MessageResponse>> {
    state.collector.reset().await.map_err(collector_error)?;
    Ok(Json(MessageResponse::ok("수집 상태를 초기화했습니다")))
}

/// `GET /api/v1/collector/stocks`
pub async fn default_stocks(
    State(state): State<Arc<AppState>>,
) -> Json<ListResponse<InstrumentRef>> {
    Json(state.collector.default_stocks().into())
}

/// `POST /api/v1/collector/accumulate`
pub async fn accumulate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AccumulateRequest>,
) -> ApiResult<Json<AccumulateResponse>> {
    request.validate().map_err(validation_error)?;

    let results = state
        .collector
        .recompute(request.stock_code.as_deref())
        .await
        .map_err(collector_error)?;

    let succeeded = results.iter().filter(|r| r.success).count();
    info!(total = results.len(), succeeded, "누적 재계산 요청 처리");

    Ok(Json(AccumulateResponse {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}

/// `POST /api/v1/collector/clear`
///
/// 본문: `{"scope": "all"}`, `{"scope": "stock", "stock_code": "005930"}`,
/// `{"scope": "codes", "stock_codes": ["005930", "000660"]}`
pub async fn clear_records(
    State(state): State<Arc<AppState>>,
    Json(scope): Json<PurgeScope>,
) -> ApiResult<Json<PurgeReport>> {
    let report = state.collector.clear(&scope).await.map_err(collector_error)?;
    Ok(Json(report))
}

pub fn collector_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_collection))
        .route("/stop", post(stop_collection))
        .route("/reset", post(reset_collection))
        .route("/stocks", get(default_stocks))
        .route("/accumulate", post(accumulate))
        .route("/clear", post(clear_records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_status_starts_idle() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/collector/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_phase"], "idle");
        assert_eq!(body["is_running"], false);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_parameters() {
        let (app, state) = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/collector/start",
            Some(json!({"years": 11})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/collector/start",
            Some(json!({"max_pages": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.collector.status().await.is_running);
    }

    #[tokio::test]
    async fn test_stop_without_run() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "POST", "/api/v1/collector/stop", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NOT_RUNNING");
    }

    #[tokio::test]
    async fn test_start_conflict_then_stop() {
        let (app, state) = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/collector/start",
            Some(json!({"years": 1, "max_pages": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["run_id"].is_string());

        let (status, body) = send(&app, "POST", "/api/v1/collector/start", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_RUNNING");

        let (status, _) = send(&app, "POST", "/api/v1/collector/reset", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/collector/clear",
            Some(json!({"scope": "all"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "POST", "/api/v1/collector/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        state.collector.wait().await;

        let (_, body) = send(&app, "GET", "/api/v1/collector/status", None).await;
        assert_eq!(body["current_phase"], "cancelled");
        assert_eq!(body["is_running"], false);
        assert_eq!(body["years"], 1);
        assert_eq!(body["max_pages"], 5);

        let (status, _) = send(&app, "POST", "/api/v1/collector/reset", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_default_stock_list() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/collector/stocks", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 50);
        assert_eq!(body["items"][0]["code"], "005930");
    }

    #[tokio::test]
    async fn test_accumulate_validation_and_empty_store() {
        let (app, _) = test_app();

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/collector/accumulate",
            Some(json!({"stock_code": "ABC"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, "POST", "/api/v1/collector/accumulate", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_clear_validates_codes() {
        let (app, _) = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/collector/clear",
            Some(json!({"scope": "codes", "stock_codes": ["12"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/collector/clear",
            Some(json!({"scope": "stock", "stock_code": "005930"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 0);
    }
}
