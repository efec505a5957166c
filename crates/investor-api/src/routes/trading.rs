//! 매매 기록 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/trading?limit=&offset=` - 최신순 목록
//! - `POST /api/v1/trading` - 수동 등록
//! - `GET|PUT|DELETE /api/v1/trading/{id}`
//! - `GET /api/v1/trading/stock/{code}?from=&to=` - 종목별 기간 조회
//! - `GET /api/v1/trading/search?q=` - 코드/이름 부분 검색
//! - `PUT /api/v1/trading/{id}/trend` - 추세 분석 결과 저장

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use investor_core::validation::{parse_iso_date, validate_stock_code};
use investor_core::{NewTradingRecord, TradingRecord, TradingRecordUpdate, TrendUpdate};
use investor_data::TradingRepository;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::{Validate, ValidationError};

use super::{validate_code, ListResponse, MessageResponse};
use crate::error::{bad_request, data_error, invalid_input, not_found, validation_error, ApiResult};
use crate::state::AppState;

fn validate_trade_date(value: &str) -> Result<(), ValidationError> {
    if parse_iso_date(value).is_err() {
        return Err(ValidationError::new("invalid_date_format")
            .with_message("날짜 형식은 YYYY-MM-DD여야 합니다".into()));
    }
    Ok(())
}

fn validate_score(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::from(-100) || *value > Decimal::from(100) {
        return Err(ValidationError::new("trend_score_out_of_range")
            .with_message("추세 점수는 -100 이상 100 이하여야 합니다".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTradingRequest {
    #[validate(custom(function = "validate_code"))]
    pub stock_code: String,

    #[validate(length(min = 1, max = 100, message = "종목명은 1-100자여야 합니다"))]
    pub stock_name: String,

    #[validate(custom(function = "validate_trade_date"))]
    pub trade_date: String,

    #[validate(range(min = 0, message = "종가는 0 이상이어야 합니다"))]
    pub close_price: Option<i64>,

    pub institution_net_buy: Option<i64>,

    pub foreigner_net_buy: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTradingRequest {
    #[validate(length(min = 1, max = 100, message = "종목명은 1-100자여야 합니다"))]
    pub stock_name: Option<String>,

    #[validate(range(min = 0, message = "종가는 0 이상이어야 합니다"))]
    pub close_price: Option<i64>,

    pub institution_net_buy: Option<i64>,

    pub foreigner_net_buy: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrendRequest {
    #[validate(length(max = 50, message = "추세 신호는 50자 이하여야 합니다"))]
    pub institution_trend_signal: Option<String>,

    #[validate(custom(function = "validate_score"))]
    pub institution_trend_score: Option<Decimal>,

    #[validate(length(max = 50, message = "추세 신호는 50자 이하여야 합니다"))]
    pub foreigner_trend_signal: Option<String>,

    #[validate(custom(function = "validate_score"))]
    pub foreigner_trend_score: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// `GET /api/v1/trading`
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse<TradingRecord>>> {
    let pool = state.pool().await?;
    let records = TradingRepository::list(&pool, query.limit.clamp(1, 1000), query.offset.max(0))
        .await
        .map_err(data_error)?;
    Ok(Json(records.into()))
}

/// `POST /api/v1/trading`
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTradingRequest>,
) -> ApiResult<(StatusCode, Json<TradingRecord>)> {
    request.validate().map_err(validation_error)?;
    let trade_date = parse_iso_date(&request.trade_date).map_err(invalid_input)?;

    let pool = state.pool().await?;
    let input = NewTradingRecord {
        stock_code: request.stock_code,
        stock_name: request.stock_name,
        trade_date,
        close_price: request.close_price,
        institution_net_buy: request.institution_net_buy,
        foreigner_net_buy: request.foreigner_net_buy,
    };
    let record = TradingRepository::create(&pool, &input)
        .await
        .map_err(data_error)?;

    info!(stock_code = %record.stock_code, trade_date = %record.trade_date, "매매 기록 등록");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/v1/trading/{id}`
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TradingRecord>> {
    let pool = state.pool().await?;
    TradingRepository::get_by_id(&pool, id)
        .await
        .map_err(data_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("매매 기록을 찾을 수 없습니다: id={}", id)))
}

/// `PUT /api/v1/trading/{id}`
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTradingRequest>,
) -> ApiResult<Json<TradingRecord>> {
    request.validate().map_err(validation_error)?;
    let update = TradingRecordUpdate {
        stock_name: request.stock_name,
        close_price: request.close_price,
        institution_net_buy: request.institution_net_buy,
        foreigner_net_buy: request.foreigner_net_buy,
    };

    let pool = state.pool().await?;
    let record = TradingRepository::update(&pool, id, &update)
        .await
        .map_err(data_error)?;
    Ok(Json(record))
}

/// `DELETE /api/v1/trading/{id}`
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let pool = state.pool().await?;
    TradingRepository::delete(&pool, id)
        .await
        .map_err(data_error)?;
    Ok(Json(MessageResponse::ok(format!("매매 기록 id={} 삭제", id))))
}

/// `GET /api/v1/trading/stock/{code}?from=&to=`
pub async fn records_by_stock(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<ListResponse<TradingRecord>>> {
    validate_stock_code(&code).map_err(invalid_input)?;
    let from = range
        .from
        .as_deref()
        .map(parse_iso_date)
        .transpose()
        .map_err(invalid_input)?;
    let to = range
        .to
        .as_deref()
        .map(parse_iso_date)
        .transpose()
        .map_err(invalid_input)?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(bad_request("시작일이 종료일보다 늦습니다"));
        }
    }

    let pool = state.pool().await?;
    let records = TradingRepository::list_by_code(&pool, &code, from, to)
        .await
        .map_err(data_error)?;
    Ok(Json(records.into()))
}

/// `GET /api/v1/trading/search?q=`
pub async fn search_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ListResponse<TradingRecord>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(bad_request("검색어가 비어 있습니다"));
    }

    let pool = state.pool().await?;
    let records = TradingRepository::search(&pool, q, query.limit.clamp(1, 1000))
        .await
        .map_err(data_error)?;
    Ok(Json(records.into()))
}

/// `PUT /api/v1/trading/{id}/trend`
pub async fn update_trend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<TrendRequest>,
) -> ApiResult<Json<TradingRecord>> {
    request.validate().map_err(validation_error)?;
    let trend = TrendUpdate {
        institution_trend_signal: request.institution_trend_signal,
        institution_trend_score: request.institution_trend_score,
        foreigner_trend_signal: request.foreigner_trend_signal,
        foreigner_trend_score: request.foreigner_trend_score,
    };

    let pool = state.pool().await?;
    let record = TradingRepository::update_trend(&pool, id, &trend)
        .await
        .map_err(data_error)?;
    Ok(Json(record))
}

pub fn trading_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/search", get(search_records))
        .route("/stock/{code}", get(records_by_stock))
        .route(
            "/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/{id}/trend", put(update_trend))
}
