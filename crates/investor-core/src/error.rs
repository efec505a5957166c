//! 수집 시스템 공통 에러 타입.

use thiserror::Error;

/// 도메인 공통 에러.
#[derive(Debug, Error)]
pub enum InvestorError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type InvestorResult<T> = Result<T, InvestorError>;

impl InvestorError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvestorError::Network(_) | InvestorError::Database(_))
    }
}

impl From<serde_json::Error> for InvestorError {
    fn from(err: serde_json::Error) -> Self {
        InvestorError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for InvestorError {
    fn from(err: config::ConfigError) -> Self {
        InvestorError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(InvestorError::Network("timeout".to_string()).is_retryable());
        assert!(!InvestorError::InvalidInput("years".to_string()).is_retryable());
    }

    #[test]
    fn test_error_message_is_korean() {
        let err = InvestorError::NotFound("005930".to_string());
        assert_eq!(err.to_string(), "찾을 수 없음: 005930");
    }
}
