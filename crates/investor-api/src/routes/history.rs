//! 변경 이력 API.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use investor_core::{tables, AuditEntry, AuditStats};
use investor_data::HistoryRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::ListResponse;
use crate::error::{bad_request, data_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// `stock_list` 또는 `stock_investor_trading`
    pub table: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct PruneQuery {
    #[serde(default = "default_before_days")]
    pub before_days: i32,
}

fn default_before_days() -> i32 {
    90
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub before_days: i32,
    pub deleted: u64,
}

/// `GET /api/v1/history?table=&limit=`
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ListResponse<AuditEntry>>> {
    if let Some(table) = query.table.as_deref() {
        if table != tables::STOCK_LIST && table != tables::STOCK_INVESTOR_TRADING {
            return Err(bad_request(format!("알 수 없는 테이블: {}", table)));
        }
    }

    let pool = state.pool().await?;
    let entries = HistoryRepository::list(&pool, query.table.as_deref(), query.limit.clamp(1, 1000))
        .await
        .map_err(data_error)?;
    Ok(Json(entries.into()))
}

/// `GET /api/v1/history/stats`
pub async fn history_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<AuditStats>> {
    let pool = state.pool().await?;
    let stats = HistoryRepository::stats(&pool).await.map_err(data_error)?;
    Ok(Json(stats))
}

/// `DELETE /api/v1/history?before_days=`
pub async fn prune_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PruneQuery>,
) -> ApiResult<Json<PruneResponse>> {
    if query.before_days < 1 {
        return Err(bad_request("before_days는 1 이상이어야 합니다"));
    }

    let pool = state.pool().await?;
    let deleted = HistoryRepository::clear_older_than(&pool, query.before_days)
        .await
        .map_err(data_error)?;

    warn!(before_days = query.before_days, deleted, "변경 이력 정리");
    Ok(Json(PruneResponse {
        before_days: query.before_days,
        deleted,
    }))
}

pub fn history_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_history).delete(prune_history))
        .route("/stats", get(history_stats))
}
