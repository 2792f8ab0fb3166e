//! # OFX Scrub
//!
//! 금융기관 OFX 응답의 알려진 결함을 고치는 순서 고정 파이프라인입니다.
//!
//! 문서를 무손실 토큰 모델([`Document`])로 분해해 각 단계를 적용하고, 마지막으로
//! 사이트에 맞는 기관별 플러그인을 실행합니다. 플러그인 결과는 검증을 통과한 경우에만
//! 반영됩니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use ofx_scrub::{Scrubber, ScrubOptions};
//!
//! let scrubber = Scrubber::new(ScrubOptions::default());
//! let fixed = scrubber.scrub(&raw, &site);
//! ```

pub mod document;
pub mod error;
pub mod import;
pub mod pipeline;
pub mod plugins;
pub mod stages;
pub mod state;
pub mod text_file;

pub use document::{Document, Tag, TagKind, Token};
pub use error::{ScrubError, ScrubResult};
pub use import::{import_file, is_already_imported, mark_imported, prepare_import, ImportOutcome, IMPORT_SENTINEL};
pub use pipeline::{ScrubOptions, ScrubReport, Scrubber};
pub use plugins::{DiscoverPlugin, InstitutionPlugin, PluginRegistry};
pub use state::ScrubState;
pub use text_file::{read_text, write_text, TextEncoding, TextFile};
