//! # OFX Core
//!
//! OFX 명세서 수집 시스템의 핵심 타입과 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 기관별 사이트 프로필 및 계좌 정의
//! - 응답 문서 구조 검증
//! - 로케일을 고려한 금액 파싱
//! - 클라이언트 UID 영속화
//! - 설정 관리
//! - 로깅 인프라

pub mod client_uid;
pub mod config;
pub mod error;
pub mod logging;
pub mod number;
pub mod types;
pub mod validate;

pub use client_uid::{ClientUidStore, JsonClientUidStore, MemoryClientUidStore};
pub use config::*;
pub use error::*;
pub use logging::*;
pub use number::NumberLocale;
pub use types::*;
pub use validate::{validate, ValidationError};
