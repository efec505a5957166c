//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류 (일시적)
    #[error("DB 연결 오류: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("쿼리 오류: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("레코드를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 자연키 중복
    #[error("중복 레코드: {0}")]
    DuplicateError(String),

    /// 잘못된 데이터
    #[error("잘못된 데이터: {0}")]
    InvalidData(String),

    /// 설정 오류
    #[error("설정 오류: {0}")]
    ConfigError(String),

    /// 마이그레이션 오류
    #[error("마이그레이션 오류: {0}")]
    MigrationError(String),

    /// 연결 풀 소진 (일시적)
    #[error("연결 풀 소진")]
    PoolExhausted,

    /// 타임아웃 (일시적)
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 외부 페이지 요청 오류 (일시적)
    #[error("페이지 요청 오류: {0}")]
    FetchError(String),

    /// 파싱 오류
    #[error("파싱 오류: {0}")]
    ParseError(String),
}

impl DataError {
    /// 재시도로 회복될 수 있는 일시적 오류인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::ConnectionError(_)
                | DataError::PoolExhausted
                | DataError::Timeout(_)
                | DataError::FetchError(_)
        )
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                DataError::ConnectionError(err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                DataError::ConnectionError(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // unique_violation
                    "23505" => DataError::DuplicateError(db_err.message().to_string()),
                    // connection_exception 계열, admin_shutdown
                    c if c.starts_with("08") || c == "57P01" => {
                        DataError::ConnectionError(db_err.message().to_string())
                    }
                    _ => DataError::QueryError(db_err.message().to_string()),
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::FetchError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
