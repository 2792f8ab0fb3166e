//! 파일 하나를 보정하는 명령어.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use ofx_core::{validate, AppConfig, SiteProfile};
use ofx_scrub::import::match_site;
use ofx_scrub::{read_text, ScrubOptions, Scrubber};

/// 보정에 쓸 사이트 프로필을 고릅니다.
///
/// 이름이 주어지면 설정에서 찾고, 없으면 문서의 FID/BANKID로 찾습니다.
/// 둘 다 실패하면 기관 규칙 없이 공통 단계만 적용하는 중립 프로필을 씁니다.
pub fn resolve_site(config: &AppConfig, text: &str, name: Option<&str>) -> Result<(String, SiteProfile)> {
    if let Some(name) = name {
        let site = config.site(name)?;
        return Ok((name.to_string(), site.clone()));
    }
    Ok(match match_site(text, &config.sites) {
        Some((name, site)) => (name.to_string(), site.clone()),
        None => ("-".to_string(), SiteProfile::new("")),
    })
}

/// 파일을 제자리에서 보정합니다. 보정 후 문서가 유효하면 `true`.
pub fn run(config: &AppConfig, file: &Path, site: Option<&str>) -> Result<bool> {
    let raw = read_text(file)
        .with_context(|| format!("cannot read {}", file.display()))?
        .text;
    let (site_name, profile) = resolve_site(config, &raw, site)?;

    let scrubber = Scrubber::new(ScrubOptions::from(&config.scrub));
    let report = scrubber.scrub_file(file, &profile)?;
    info!(
        path = %file.display(),
        site = %site_name,
        changed = report.changed(),
        "Scrub finished"
    );
    for note in &report.notes {
        println!("{}", note);
    }

    match validate(&report.text) {
        Ok(()) => Ok(true),
        Err(reason) => {
            println!("{}: {}", file.display(), reason);
            Ok(false)
        }
    }
}
