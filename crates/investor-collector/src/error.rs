//! Collector 에러 타입.

use investor_core::InvestorError;
use investor_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    /// 저장소/페이지 요청 에러
    #[error("데이터 에러: {0}")]
    Data(#[from] DataError),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 요청 값 검증 실패
    #[error("검증 실패: {0}")]
    Validation(String),

    /// 이미 수집이 실행 중
    #[error("데이터 수집이 이미 실행 중입니다")]
    AlreadyRunning,

    /// 실행 중인 수집이 없음
    #[error("실행 중인 데이터 수집이 없습니다")]
    NotRunning,

    /// 기타 에러
    #[error("{0}")]
    Other(String),
}

impl CollectorError {
    /// 재시도로 회복될 수 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, CollectorError::Data(e) if e.is_transient())
    }
}

impl From<InvestorError> for CollectorError {
    fn from(err: InvestorError) -> Self {
        match err {
            InvestorError::InvalidInput(msg) => CollectorError::Validation(msg),
            InvestorError::Config(msg) => CollectorError::Config(msg),
            other => CollectorError::Other(other.to_string()),
        }
    }
}

/// Collector Result 타입
pub type Result<T> = std::result::Result<T, CollectorError>;
