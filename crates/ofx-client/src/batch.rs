//! 여러 계좌의 순차 수집.
//!
//! 한 계좌의 실패가 나머지 계좌 처리를 막지 않습니다. 실패는 전체 성공 여부와
//! 건너뛰기 목록으로 모아 반환합니다. 로그인 잠금을 피하도록 설정된 경우 실패한
//! (사이트, 사용자) 조합은 같은 실행 동안 다시 시도하지 않습니다.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ofx_core::{account_span, AccountDescriptor, ClientUidStore, SiteProfile};
use tracing::{error, info, warn, Instrument};

use crate::fetch::StatementFetcher;
use crate::transport::Transport;

/// 배치 실행 옵션.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// 조회 기간 (일)
    pub interval_days: u32,
    /// 실패한 사이트/사용자 조합 건너뛰기
    pub skip_failed_logon: bool,
}

/// 생성된 응답 파일.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// 사이트 이름
    pub site: String,
    /// 계좌 번호 (버전 접미사 포함)
    pub account: String,
    /// 파일 경로
    pub path: PathBuf,
}

/// 건너뛰기 목록 항목.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SkipEntry {
    /// 사이트 이름
    pub site: String,
    /// 사용자
    pub username: String,
}

/// 배치 실행 결과.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// 모든 계좌가 성공했는지 여부
    pub success: bool,
    /// 스크럽까지 마친 파일
    pub files: Vec<FetchedFile>,
    /// 같은 실행에서 다시 시도하지 않을 조합
    pub skipped: Vec<SkipEntry>,
    /// 건너뛴 계좌 수
    pub skipped_accounts: usize,
}

impl BatchSummary {
    fn is_skipped(&self, site: &str, username: &str) -> bool {
        self.skipped
            .iter()
            .any(|s| s.site == site && s.username == username)
    }
}

/// 계좌들을 순서대로 수집합니다.
pub async fn run_accounts<T: Transport>(
    fetcher: &StatementFetcher<T>,
    sites: &BTreeMap<String, SiteProfile>,
    accounts: &[AccountDescriptor],
    options: BatchOptions,
    uids: &mut (dyn ClientUidStore + Send),
) -> BatchSummary {
    let mut summary = BatchSummary {
        success: true,
        ..Default::default()
    };

    for account in accounts {
        if summary.is_skipped(&account.site, &account.username) {
            warn!(
                site = %account.site,
                account = %account.query_number(),
                "Skipping account after an earlier failure for the same site and user"
            );
            summary.skipped_accounts += 1;
            continue;
        }

        let span = account_span!("fetch", &account.site, account.query_number());
        let ok = fetch_one(fetcher, sites, account, options, uids, &mut summary)
            .instrument(span)
            .await;

        if !ok {
            summary.success = false;
            if options.skip_failed_logon {
                summary.skipped.push(SkipEntry {
                    site: account.site.clone(),
                    username: account.username.clone(),
                });
            }
        }
    }

    info!(
        files = summary.files.len(),
        skipped = summary.skipped_accounts,
        success = summary.success,
        "Batch finished"
    );
    summary
}

async fn fetch_one<T: Transport>(
    fetcher: &StatementFetcher<T>,
    sites: &BTreeMap<String, SiteProfile>,
    account: &AccountDescriptor,
    options: BatchOptions,
    uids: &mut (dyn ClientUidStore + Send),
    summary: &mut BatchSummary,
) -> bool {
    let site = sites.get(&account.site).or_else(|| {
        sites
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&account.site))
            .map(|(_, site)| site)
    });
    let Some(site) = site else {
        error!(site = %account.site, "Site is not defined");
        return false;
    };

    match fetcher
        .fetch(&account.site, site, account, options.interval_days, uids)
        .await
    {
        Ok(report) if report.success => {
            if let Some(path) = report.file {
                summary.files.push(FetchedFile {
                    site: account.site.clone(),
                    account: account.account.clone(),
                    path,
                });
            }
            true
        }
        Ok(report) => {
            error!(
                site = %account.site,
                account = %account.query_number(),
                reason = report.error.as_deref().unwrap_or("unknown"),
                "Statement download failed"
            );
            false
        }
        Err(e) => {
            error!(
                site = %account.site,
                account = %account.query_number(),
                error = %e,
                "Statement download aborted"
            );
            false
        }
    }
}
