//! 스크럽 에러 타입.

use ofx_core::ValidationError;
use thiserror::Error;

/// 스크럽 작업 결과.
pub type ScrubResult<T> = Result<T, ScrubError>;

/// 스크럽 에러.
#[derive(Debug, Error)]
pub enum ScrubError {
    /// 파일 입출력 실패
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 입력이 OFX 문서가 아님
    #[error("Not a valid OFX document: {0}")]
    InvalidDocument(#[from] ValidationError),

    /// 플러그인 처리 실패
    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },
}

impl ScrubError {
    /// 플러그인 에러 생성.
    pub fn plugin(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }
}
