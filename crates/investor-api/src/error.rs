//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트가 `{ code, message, details?, timestamp? }` 형식으로 실패를 알립니다.

use axum::http::StatusCode;
use axum::Json;
use investor_collector::CollectorError;
use investor_core::InvestorError;
use investor_data::DataError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::ValidationErrors;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "ALREADY_RUNNING",
///   "message": "데이터 수집이 이미 실행 중입니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "DB_ERROR", "VALIDATION_ERROR", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 타임스탬프 없는 간단한 에러.
    pub fn simple(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: None,
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 실패 값.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

fn reply(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    reply(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    reply(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn db_unavailable() -> ApiError {
    reply(
        StatusCode::SERVICE_UNAVAILABLE,
        "DB_UNAVAILABLE",
        "데이터베이스가 연결되지 않았습니다",
    )
}

/// `validator` 오류를 400 응답으로 변환합니다. 필드별 메시지는 `; `로 잇습니다.
pub fn validation_error(errors: ValidationErrors) -> ApiError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");
    bad_request(message)
}

pub fn data_error(err: DataError) -> ApiError {
    match err {
        DataError::NotFound(msg) => not_found(msg),
        DataError::DuplicateError(msg) => reply(StatusCode::CONFLICT, "DUPLICATE", msg),
        DataError::InvalidData(msg) => bad_request(msg),
        e if e.is_transient() => {
            tracing::warn!(error = %e, "일시적 저장소 오류");
            reply(StatusCode::SERVICE_UNAVAILABLE, "DB_UNAVAILABLE", e.to_string())
        }
        e => {
            tracing::error!(error = %e, "저장소 오류");
            reply(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", e.to_string())
        }
    }
}

pub fn collector_error(err: CollectorError) -> ApiError {
    match err {
        CollectorError::AlreadyRunning => {
            reply(StatusCode::CONFLICT, "ALREADY_RUNNING", err.to_string())
        }
        CollectorError::NotRunning => {
            reply(StatusCode::BAD_REQUEST, "NOT_RUNNING", err.to_string())
        }
        CollectorError::Validation(msg) => bad_request(msg),
        CollectorError::Data(e) => data_error(e),
        e => {
            tracing::error!(error = %e, "수집기 오류");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "COLLECTOR_ERROR",
                e.to_string(),
            )
        }
    }
}

pub fn invalid_input(err: InvestorError) -> ApiError {
    bad_request(err.to_string())
}
