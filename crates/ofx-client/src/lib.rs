//! # OFX Client
//!
//! 금융기관 OFX 서버에서 명세서를 받아오는 클라이언트입니다.
//!
//! - [`message`]: 요청 메시지 트리와 1.x(SGML)/2.x(XML) 직렬화
//! - [`transport`]: HTTPS 전송과 쿠키 재시도
//! - [`fetch`]: 계좌 단위 수집 (전송 → 검증 → 스크럽)
//! - [`batch`]: 여러 계좌의 순차 수집과 실패 건너뛰기

pub mod batch;
pub mod error;
pub mod fetch;
pub mod message;
pub mod transport;

pub use batch::{run_accounts, BatchOptions, BatchSummary, FetchedFile, SkipEntry};
pub use error::{ClientError, ClientResult};
pub use fetch::{clean_site_name, response_file_name, restore_account_suffix, select_request, FetchReport, StatementFetcher};
pub use message::{parse_request, Encoding, Node, OfxRequest, SignOn, StatementRequest};
pub use transport::{HttpSettings, HttpTransport, QueryOutcome, Transport};
