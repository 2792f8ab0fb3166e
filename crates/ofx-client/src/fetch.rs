//! 계좌 단위 명세서 수집.
//!
//! 요청 선택 → 로그인 정보 구성 → 전송 → 계좌 번호 복원 → 검증 → 스크럽 순으로
//! 진행합니다. 설정 문제는 네트워크 호출 전에 에러로 반환하고, 그 외의 실패는
//! [`FetchReport`]의 실패 상태로 보고합니다.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{Duration, Local, NaiveDateTime};
use ofx_core::{validate, AccountDescriptor, ClientUidStore, SiteProfile, StatementKind, ValidationError};
use ofx_scrub::Scrubber;
use rand::Rng;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::message::{OfxRequest, SignOn, StatementRequest};
use crate::transport::Transport;

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// 파일 이름에서 제거하는 문자.
const ILLEGAL_FILE_CHARS: &str = " &\\/:*?\"!=|()";

/// 수집 결과.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// 유효한 명세서를 받아 스크럽까지 마쳤는지 여부
    pub success: bool,
    /// 응답 파일 (전송 실패 시 `None`, 검증 실패 시에도 검토용으로 유지)
    pub file: Option<PathBuf>,
    /// 실패 사유
    pub error: Option<String>,
}

impl FetchReport {
    fn transport_failed() -> Self {
        Self {
            success: false,
            file: None,
            error: Some("transport failure".to_string()),
        }
    }

    fn invalid(file: PathBuf, reason: &ValidationError) -> Self {
        Self {
            success: false,
            file: Some(file),
            error: Some(reason.to_string()),
        }
    }
}

/// 사이트 이름에서 파일 이름에 쓸 수 없는 문자를 제거합니다.
pub fn clean_site_name(site_name: &str) -> String {
    site_name
        .chars()
        .filter(|c| !ILLEGAL_FILE_CHARS.contains(*c))
        .collect()
}

/// 응답 파일 이름 (`<사이트><시각><6자리 난수>.ofx`).
pub fn response_file_name(site_name: &str, now: NaiveDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!(
        "{}{}{}.ofx",
        clean_site_name(site_name),
        now.format(DATETIME_FORMAT),
        suffix
    )
}

/// 사이트 기능과 계좌로 거래 섹션을 선택합니다.
///
/// 계좌 번호가 비어 있으면 계좌 목록 조회입니다. 그 외에는 카드, 투자, 은행 순으로
/// 선택하며 필요한 식별자가 없으면 설정 에러입니다.
pub fn select_request(
    site_name: &str,
    site: &SiteProfile,
    account: &AccountDescriptor,
    dtstart: &str,
    now: NaiveDateTime,
) -> ClientResult<StatementRequest> {
    if account.is_discovery() {
        return Ok(StatementRequest::AccountInfo {
            dtacctup: site.dtacctup_or_default().to_string(),
        });
    }

    let acctid = account.query_number().to_string();
    match site.statement_kind() {
        Some(StatementKind::CreditCard) => Ok(StatementRequest::CreditCard {
            acctid,
            dtstart: dtstart.to_string(),
        }),
        Some(StatementKind::Investment) => {
            let brokerid = site.broker_or_org().ok_or_else(|| {
                ClientError::Config(format!(
                    "site {} is missing a required BROKERID or FIORG value",
                    site_name
                ))
            })?;
            Ok(StatementRequest::Investment {
                brokerid: brokerid.to_string(),
                acctid,
                dtstart: dtstart.to_string(),
                dtasof: now.format(DATETIME_FORMAT).to_string(),
            })
        }
        Some(StatementKind::Bank) => {
            if site.bankid.is_empty() {
                return Err(ClientError::Config(format!(
                    "site {} is missing a required BANKID value",
                    site_name
                )));
            }
            Ok(StatementRequest::Bank {
                bankid: site.bankid.clone(),
                acctid,
                accttype: account.account_type.clone(),
                dtstart: dtstart.to_string(),
            })
        }
        None => Err(ClientError::Config(format!(
            "site {} has no statement capability (BASTMT, CCSTMT or INVSTMT)",
            site_name
        ))),
    }
}

/// `<ACCTID>번호`를 `<ACCTID>번호:접미사`로 되돌립니다. 태그 대소문자는 무시합니다.
pub fn restore_account_suffix(text: &str, query_number: &str, full_number: &str) -> String {
    if query_number == full_number || query_number.is_empty() {
        return text.to_string();
    }

    let upper = text.to_ascii_uppercase();
    let needle = format!("<ACCTID>{}", query_number.to_ascii_uppercase());
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;

    for (pos, _) in upper.match_indices(&needle) {
        let end = pos + needle.len();
        let boundary = upper[end..]
            .chars()
            .next()
            .map(|c| !(c.is_ascii_alphanumeric() || c == ':'))
            .unwrap_or(true);
        if !boundary {
            continue;
        }
        out.push_str(&text[last..pos]);
        out.push_str(&text[pos..pos + "<ACCTID>".len()]);
        out.push_str(full_number);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// 명세서 수집기.
pub struct StatementFetcher<T: Transport> {
    transport: T,
    scrubber: Scrubber,
    xfr_dir: PathBuf,
}

impl<T: Transport> StatementFetcher<T> {
    /// 생성합니다. 응답 파일은 `xfr_dir`에 기록됩니다.
    pub fn new(transport: T, scrubber: Scrubber, xfr_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            scrubber,
            xfr_dir: xfr_dir.into(),
        }
    }

    /// 응답 파일 디렉토리.
    pub fn xfr_dir(&self) -> &Path {
        &self.xfr_dir
    }

    /// 스크럽 실행기.
    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    /// 한 계좌의 명세서를 받습니다.
    ///
    /// 설정 에러는 `Err`로, 전송/검증 실패는 `Ok(FetchReport { success: false, .. })`로
    /// 반환합니다.
    pub async fn fetch(
        &self,
        site_name: &str,
        site: &SiteProfile,
        account: &AccountDescriptor,
        interval_days: u32,
        uids: &mut (dyn ClientUidStore + Send),
    ) -> ClientResult<FetchReport> {
        let now = Local::now().naive_local();
        let interval = site.effective_interval(interval_days);
        let dtstart = (now - Duration::days(i64::from(interval)))
            .format(DATE_FORMAT)
            .to_string();

        let request = select_request(site_name, site, account, &dtstart, now)?;

        let clientuid = match &site.clientuid {
            Some(uid) => Some(uid.clone()),
            None if site.requires_client_uid() => {
                Some(uids.get_or_create(&site.url, &account.username)?)
            }
            None => None,
        };

        let signon = SignOn {
            dtclient: now.format(DATETIME_FORMAT).to_string(),
            userid: account.username.clone(),
            userpass: account.password.expose_secret().to_string(),
            fiorg: site.fiorg.clone(),
            fid: site.fid.clone(),
            appid: site.appid.clone(),
            appver: site.appver.clone(),
            clientuid,
        };
        let wire = OfxRequest::new(&site.ofxver, &signon, &request).to_wire();

        if site.delay > 0.0 && site.delay.is_finite() {
            info!("Delaying {:.1} seconds...", site.delay);
            tokio::time::sleep(StdDuration::from_secs_f64(site.delay)).await;
        }

        info!(
            "{}: {}: Getting records since: {}",
            site_name,
            account.query_number(),
            dtstart
        );

        let dest = self.xfr_dir.join(response_file_name(site_name, now));
        let outcome = self.transport.query(site, &wire, &dest).await;
        if !outcome.success {
            return Ok(FetchReport::transport_failed());
        }

        let text = match std::fs::read_to_string(&dest) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(self.reject(dest, ValidationError::Empty)),
            Err(e) => {
                warn!(path = %dest.display(), error = %e, "Response file is missing");
                return Ok(FetchReport {
                    success: false,
                    file: None,
                    error: Some(ValidationError::Empty.to_string()),
                });
            }
        };

        if account.has_version_suffix() {
            let restored = restore_account_suffix(&text, account.query_number(), &account.account);
            if restored != text {
                std::fs::write(&dest, &restored)?;
            }
            if let Err(reason) = validate(&restored) {
                return Ok(self.reject(dest, reason));
            }
        } else if let Err(reason) = validate(&text) {
            return Ok(self.reject(dest, reason));
        }

        self.scrubber.scrub_file(&dest, site)?;

        Ok(FetchReport {
            success: true,
            file: Some(dest),
            error: None,
        })
    }

    fn reject(&self, dest: PathBuf, reason: ValidationError) -> FetchReport {
        warn!(%reason, "Invalid OFX response");
        info!("**  Review {} for possible clues.", dest.display());
        FetchReport::invalid(dest, &reason)
    }
}
