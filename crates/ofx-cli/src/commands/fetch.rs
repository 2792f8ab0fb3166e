//! 명세서 수집 명령어.
//!
//! 설정된 계좌를 순서대로 처리하고, 만들어진 파일과 건너뛴 조합을 출력합니다.

use anyhow::{bail, Context, Result};
use tracing::info;

use ofx_client::{run_accounts, BatchOptions, HttpSettings, HttpTransport, StatementFetcher};
use ofx_core::{AccountDescriptor, AppConfig, JsonClientUidStore};
use ofx_scrub::{ScrubOptions, Scrubber};

/// 계좌 목록을 사이트 이름으로 거릅니다 (대소문자 무시).
pub fn select_accounts(accounts: Vec<AccountDescriptor>, site: Option<&str>) -> Vec<AccountDescriptor> {
    match site {
        Some(site) => accounts
            .into_iter()
            .filter(|a| a.site.eq_ignore_ascii_case(site))
            .collect(),
        None => accounts,
    }
}

/// 수집을 실행합니다. 모든 계좌가 성공하면 `true`.
pub async fn run(config: AppConfig, site: Option<&str>, interval: Option<u32>) -> Result<bool> {
    let AppConfig {
        download,
        scrub,
        http,
        client_uid_store,
        sites,
        accounts,
        ..
    } = config;

    let accounts = select_accounts(accounts, site);
    if accounts.is_empty() {
        match site {
            Some(site) => bail!("no accounts configured for site '{}'", site),
            None => bail!("no accounts configured"),
        }
    }

    std::fs::create_dir_all(&download.xfr_dir)
        .with_context(|| format!("cannot create {}", download.xfr_dir.display()))?;
    let mut uids = JsonClientUidStore::open(&client_uid_store)?;

    let transport = HttpTransport::new(HttpSettings::from(&http));
    let scrubber = Scrubber::new(ScrubOptions::from(&scrub));
    let fetcher = StatementFetcher::new(transport, scrubber, download.xfr_dir.clone());

    let options = BatchOptions {
        interval_days: interval.unwrap_or(download.default_interval_days),
        skip_failed_logon: download.skip_failed_logon,
    };
    info!(
        accounts = accounts.len(),
        interval_days = options.interval_days,
        "Starting statement download"
    );

    let summary = run_accounts(&fetcher, &sites, &accounts, options, &mut uids).await;

    for file in &summary.files {
        println!("{:<20} {:<20} {}", file.site, file.account, file.path.display());
    }
    for entry in &summary.skipped {
        println!("skipped: {} ({})", entry.site, entry.username);
    }

    Ok(summary.success)
}
