//! 클라이언트 에러 타입.

use ofx_core::{OfxError, ValidationError};
use ofx_scrub::ScrubError;
use thiserror::Error;

/// 클라이언트 작업 결과.
pub type ClientResult<T> = Result<T, ClientError>;

/// 클라이언트 에러.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 요청 전에 발견된 설정 문제 (네트워크 호출 없음)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 응답 구조 검증 실패
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// 파일 입출력 실패
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 코어 에러 (클라이언트 UID 저장소 등)
    #[error(transparent)]
    Core(#[from] OfxError),

    /// 스크럽 실패
    #[error(transparent)]
    Scrub(#[from] ScrubError),
}

impl ClientError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout(_))
    }

    /// 설정 에러인지 확인.
    pub fn is_config(&self) -> bool {
        match self {
            ClientError::Config(_) => true,
            ClientError::Core(e) => e.is_config(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
