//! 종목 관리 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/stocks` - 전체 종목
//! - `POST /api/v1/stocks` - 종목 등록
//! - `GET /api/v1/stocks/{id}` - 단일 종목
//! - `PUT /api/v1/stocks/{id}` - 종목명/기준일 수정
//! - `DELETE /api/v1/stocks/{id}` - 종목 삭제
//! - `GET /api/v1/stocks/code/{code}` - 종목코드로 조회
//! - `GET /api/v1/stocks/search?q=` - 코드/이름 부분 검색
//! - `PUT /api/v1/stocks/{id}/accum` - 누적 기준값 설정

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use investor_core::validation::{parse_iso_date, validate_stock_code};
use investor_core::{AccumBaseline, Instrument, InstrumentUpdate, NewInstrument};
use investor_data::StockRepository;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{validate_code, ListResponse, MessageResponse};
use crate::error::{data_error, invalid_input, not_found, validation_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockRequest {
    #[validate(custom(function = "validate_code"))]
    pub stock_code: String,

    #[validate(length(min = 1, max = 100, message = "종목명은 1-100자여야 합니다"))]
    pub stock_name: String,

    /// 누적 기준일 (YYYY-MM-DD)
    pub init_date: Option<String>,

    #[validate(range(min = 0, message = "기관 누적 기준값은 0 이상이어야 합니다"))]
    pub institution_accum_init: Option<i64>,

    #[validate(range(min = 0, message = "외국인 누적 기준값은 0 이상이어야 합니다"))]
    pub foreigner_accum_init: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStockRequest {
    #[validate(length(min = 1, max = 100, message = "종목명은 1-100자여야 합니다"))]
    pub stock_name: Option<String>,

    pub init_date: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccumRequest {
    #[validate(range(min = 0, message = "기관 누적 기준값은 0 이상이어야 합니다"))]
    pub institution_accum_init: i64,

    #[validate(range(min = 0, message = "외국인 누적 기준값은 0 이상이어야 합니다"))]
    pub foreigner_accum_init: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    50
}

fn parse_optional_date(value: Option<&str>) -> ApiResult<Option<chrono::NaiveDate>> {
    value.map(parse_iso_date).transpose().map_err(invalid_input)
}

/// `GET /api/v1/stocks`
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ListResponse<Instrument>>> {
    let pool = state.pool().await?;
    let stocks = StockRepository::get_all(&pool).await.map_err(data_error)?;
    Ok(Json(stocks.into()))
}

/// `POST /api/v1/stocks`
pub async fn create_stock(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStockRequest>,
) -> ApiResult<(StatusCode, Json<Instrument>)> {
    request.validate().map_err(validation_error)?;
    let init_date = parse_optional_date(request.init_date.as_deref())?;

    let pool = state.pool().await?;
    let input = NewInstrument {
        stock_code: request.stock_code,
        stock_name: request.stock_name.trim().to_string(),
        init_date,
        institution_accum_init: request.institution_accum_init.unwrap_or(0),
        foreigner_accum_init: request.foreigner_accum_init.unwrap_or(0),
    };
    let stock = StockRepository::create(&pool, &input)
        .await
        .map_err(data_error)?;

    info!(stock_code = %stock.stock_code, id = stock.id, "종목 등록");
    Ok((StatusCode::CREATED, Json(stock)))
}

/// `GET /api/v1/stocks/{id}`
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Instrument>> {
    let pool = state.pool().await?;
    StockRepository::get_by_id(&pool, id)
        .await
        .map_err(data_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("종목을 찾을 수 없습니다: id={}", id)))
}

/// `GET /api/v1/stocks/code/{code}`
pub async fn get_stock_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<Instrument>> {
    validate_stock_code(&code).map_err(invalid_input)?;
    let pool = state.pool().await?;
    StockRepository::get_by_code(&pool, &code)
        .await
        .map_err(data_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("종목을 찾을 수 없습니다: {}", code)))
}

/// `PUT /api/v1/stocks/{id}`
pub async fn update_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStockRequest>,
) -> ApiResult<Json<Instrument>> {
    request.validate().map_err(validation_error)?;
    let update = InstrumentUpdate {
        stock_name: request.stock_name.map(|n| n.trim().to_string()),
        init_date: parse_optional_date(request.init_date.as_deref())?,
    };

    let pool = state.pool().await?;
    let stock = StockRepository::update(&pool, id, &update)
        .await
        .map_err(data_error)?;
    Ok(Json(stock))
}

/// `DELETE /api/v1/stocks/{id}`
pub async fn delete_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let pool = state.pool().await?;
    StockRepository::delete(&pool, id)
        .await
        .map_err(data_error)?;

    info!(id, "종목 삭제");
    Ok(Json(MessageResponse::ok(format!("종목 id={} 삭제", id))))
}

/// `GET /api/v1/stocks/search?q=`
pub async fn search_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ListResponse<Instrument>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(crate::error::bad_request("검색어가 비어 있습니다"));
    }

    let pool = state.pool().await?;
    let stocks = StockRepository::search(&pool, q, query.limit.clamp(1, 500))
        .await
        .map_err(data_error)?;
    Ok(Json(stocks.into()))
}

/// `PUT /api/v1/stocks/{id}/accum`
pub async fn update_accum(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAccumRequest>,
) -> ApiResult<Json<Instrument>> {
    request.validate().map_err(validation_error)?;
    let baseline = AccumBaseline {
        institution_accum_init: request.institution_accum_init,
        foreigner_accum_init: request.foreigner_accum_init,
    };

    let pool = state.pool().await?;
    let stock = StockRepository::update_baseline(&pool, id, baseline)
        .await
        .map_err(data_error)?;
    Ok(Json(stock))
}

pub fn stocks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_stocks).post(create_stock))
        .route("/search", get(search_stocks))
        .route("/code/{code}", get(get_stock_by_code))
        .route(
            "/{id}",
            get(get_stock).put(update_stock).delete(delete_stock),
        )
        .route("/{id}/accum", put(update_accum))
}
