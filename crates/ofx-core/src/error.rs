//! OFX 시스템의 에러 타입.
//!
//! 이 모듈은 크레이트 전반에서 공유되는 에러 타입을 정의합니다.

use thiserror::Error;

/// 핵심 OFX 에러.
#[derive(Debug, Error)]
pub enum OfxError {
    /// 설정 에러 (필수 식별자 누락 등)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 파일 입출력 에러
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("Not found: {0}")]
    NotFound(String),
}

/// OFX 작업을 위한 Result 타입.
pub type OfxResult<T> = Result<T, OfxError>;

impl OfxError {
    /// 설정 문제로 인한 에러인지 확인합니다.
    ///
    /// 설정 에러는 네트워크 호출 전에 해당 계좌의 요청을 중단시킵니다.
    pub fn is_config(&self) -> bool {
        matches!(self, OfxError::Config(_) | OfxError::InvalidInput(_))
    }
}

impl From<serde_json::Error> for OfxError {
    fn from(err: serde_json::Error) -> Self {
        OfxError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for OfxError {
    fn from(err: config::ConfigError) -> Self {
        OfxError::Config(err.to_string())
    }
}
