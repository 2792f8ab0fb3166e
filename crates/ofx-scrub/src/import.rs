//! 수동으로 받은 OFX 파일의 재가공.
//!
//! 가져오기 디렉토리에 놓인 파일을 검증하고, 응답의 `FID`/`BANKID`로 사이트를
//! 찾아 같은 파이프라인으로 보정한 뒤 헤더의 `NEWFILEUID`에 처리 표식을 남깁니다.
//! 표식이 있는 파일은 다시 보정하지 않습니다.

use std::collections::BTreeMap;
use std::path::Path;

use ofx_core::{validate, SiteProfile};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::ScrubResult;
use crate::pipeline::Scrubber;
use crate::text_file::{read_text, write_text};

/// 처리 완료 표식.
pub const IMPORT_SENTINEL: &str = "PSIMPORT";

/// 표식을 찾는 헤더 범위 (문자 수).
const SENTINEL_WINDOW: usize = 200;

/// 재가공 결과.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// 결과 문서
    pub text: String,
    /// 일치한 사이트 이름
    pub site: Option<String>,
    /// 이번 실행에서 보정했는지 여부 (이미 표식이 있으면 `false`)
    pub scrubbed: bool,
}

/// 헤더에 처리 표식이 있는지 확인합니다.
pub fn is_already_imported(text: &str) -> bool {
    let head: String = text
        .chars()
        .take(SENTINEL_WINDOW)
        .collect::<String>()
        .to_ascii_uppercase();
    head.contains(&format!("NEWFILEUID:{}", IMPORT_SENTINEL))
        || head.contains(&format!("NEWFILEUID=\"{}\"", IMPORT_SENTINEL))
}

/// 헤더의 `NEWFILEUID` 값을 처리 표식으로 바꿉니다.
///
/// SGML 헤더(`NEWFILEUID:...`)와 XML 처리 지시문(`NEWFILEUID="..."`)을 모두 지원합니다.
/// 헤더에 해당하는 첫 번째 `NEWFILEUID`만 바꾸며, 본문에 같은 문자열이 있어도 건드리지 않습니다.
/// `NEWFILEUID`가 없으면 원문을 그대로 반환합니다.
pub fn mark_imported(text: &str) -> String {
    let upper = text.to_ascii_uppercase();
    let Some(pos) = upper.find("NEWFILEUID") else {
        return text.to_string();
    };
    let key_end = pos + "NEWFILEUID".len();
    let after = &text[key_end..];

    if let Some(value) = after.strip_prefix(':') {
        let end = value.find(['\r', '\n']).unwrap_or(value.len());
        let tail = &value[end..];
        return format!("{}NEWFILEUID:{}{}", &text[..pos], IMPORT_SENTINEL, tail);
    }

    if let Some(quoted) = after.strip_prefix("=\"") {
        if let Some(close) = quoted.find('"') {
            let tail = &quoted[close + 1..];
            return format!("{}NEWFILEUID=\"{}\"{}", &text[..pos], IMPORT_SENTINEL, tail);
        }
    }

    text.to_string()
}

/// 응답의 `FID` 또는 `BANKID`로 사이트를 찾습니다.
pub fn match_site<'a>(
    text: &str,
    sites: &'a BTreeMap<String, SiteProfile>,
) -> Option<(&'a str, &'a SiteProfile)> {
    let doc = Document::parse(text);
    let fid = doc.first_value("FID");
    let bankid = doc.first_value("BANKID");

    sites
        .iter()
        .find(|(_, site)| {
            let fid_hit = fid.is_some_and(|v| !site.fid.is_empty() && site.fid == v);
            let bank_hit = bankid.is_some_and(|v| !site.bankid.is_empty() && site.bankid == v);
            fid_hit || bank_hit
        })
        .map(|(name, site)| (name.as_str(), site))
}

/// 문서를 재가공합니다.
///
/// 검증에 실패하면 에러를 반환하고, 이미 표식이 있으면 보정 없이 반환합니다.
/// 일치하는 사이트가 없으면 플러그인이 선택되지 않는 중립 프로필로 보정합니다.
pub fn prepare_import(
    text: &str,
    sites: &BTreeMap<String, SiteProfile>,
    scrubber: &Scrubber,
) -> ScrubResult<ImportOutcome> {
    validate(text)?;

    if is_already_imported(text) {
        debug!("File already carries the import marker");
        return Ok(ImportOutcome {
            text: text.to_string(),
            site: None,
            scrubbed: false,
        });
    }

    let neutral = SiteProfile::new("");
    let (site_name, site) = match match_site(text, sites) {
        Some((name, site)) => (Some(name.to_string()), site),
        None => (None, &neutral),
    };

    let scrubbed = scrubber.scrub(text, site);
    Ok(ImportOutcome {
        text: mark_imported(&scrubbed),
        site: site_name,
        scrubbed: true,
    })
}

/// 파일을 재가공해 같은 경로에 씁니다.
pub fn import_file(
    path: impl AsRef<Path>,
    sites: &BTreeMap<String, SiteProfile>,
    scrubber: &Scrubber,
) -> ScrubResult<ImportOutcome> {
    let path = path.as_ref();
    let file = read_text(path)?;
    let outcome = prepare_import(&file.text, sites, scrubber)?;

    if outcome.text != file.text {
        write_text(path, &outcome.text, file.encoding)?;
    }
    info!(
        path = %path.display(),
        site = outcome.site.as_deref().unwrap_or("-"),
        scrubbed = outcome.scrubbed,
        "Imported OFX file"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrubError;

    const V1: &str = "OFXHEADER:100\r\nDATA:OFXSGML\r\nOLDFILEUID:NONE\r\nNEWFILEUID:NONE\r\n\r\n<OFX><SIGNONMSGSRSV1><SONRS><FI><ORG>Bank<FID>1234</FI></SONRS></SIGNONMSGSRSV1><NAME>A&B</OFX>";
    const V2: &str = "<?xml version=\"1.0\"?>\r\n<?OFX OFXHEADER=\"200\" VERSION=\"220\" NEWFILEUID=\"NONE\"?>\r\n<OFX><BANKID>9999</BANKID></OFX>";

    fn sites() -> BTreeMap<String, SiteProfile> {
        let mut fid_site = SiteProfile::new("https://ofx.bank.test");
        fid_site.fid = "1234".to_string();
        let mut bank_site = SiteProfile::new("https://ofx.other.test");
        bank_site.bankid = "9999".to_string();

        let mut sites = BTreeMap::new();
        sites.insert("ByFid".to_string(), fid_site);
        sites.insert("ByBank".to_string(), bank_site);
        sites
    }

    #[test]
    fn test_mark_imported_sgml_and_xml() {
        let marked = mark_imported(V1);
        assert!(marked.contains("NEWFILEUID:PSIMPORT\r\n"));
        assert!(is_already_imported(&marked));

        let marked = mark_imported(V2);
        assert!(marked.contains("NEWFILEUID=\"PSIMPORT\"?>"));
        assert!(is_already_imported(&marked));

        assert!(!is_already_imported(V1));
        assert_eq!(mark_imported("<OFX></OFX>"), "<OFX></OFX>");
    }

    #[test]
    fn test_mark_imported_replaces_only_header_value() {
        let doc = "NEWFILEUID:NONE\r\n\r\n<OFX><MEMO>NEWFILEUID:keep me</OFX>";
        let marked = mark_imported(doc);
        assert_eq!(
            marked,
            "NEWFILEUID:PSIMPORT\r\n\r\n<OFX><MEMO>NEWFILEUID:keep me</OFX>"
        );
        assert_eq!(mark_imported(&marked), marked);
    }

    #[test]
    fn test_match_site_by_fid_or_bankid() {
        let sites = sites();
        assert_eq!(match_site(V1, &sites).map(|(n, _)| n), Some("ByFid"));
        assert_eq!(match_site(V2, &sites).map(|(n, _)| n), Some("ByBank"));
        assert!(match_site("<OFX><FID>0</OFX>", &sites).is_none());
    }

    #[test]
    fn test_prepare_import_scrubs_once() {
        let sites = sites();
        let scrubber = Scrubber::default();

        let first = prepare_import(V1, &sites, &scrubber).unwrap();
        assert!(first.scrubbed);
        assert_eq!(first.site.as_deref(), Some("ByFid"));
        assert!(first.text.contains("<NAME>A&amp;B"));
        assert!(first.text.contains("NEWFILEUID:PSIMPORT"));

        let second = prepare_import(&first.text, &sites, &scrubber).unwrap();
        assert!(!second.scrubbed);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn test_unmatched_file_uses_neutral_profile() {
        let doc = "NEWFILEUID:NONE\r\n\r\n<OFX><FID>42<NAME>x&y</OFX>";
        let outcome = prepare_import(doc, &sites(), &Scrubber::default()).unwrap();
        assert!(outcome.site.is_none());
        assert!(outcome.text.contains("x&amp;y"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let err = prepare_import("garbage", &sites(), &Scrubber::default()).unwrap_err();
        assert!(matches!(err, ScrubError::InvalidDocument(_)));
    }

    #[test]
    fn test_import_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.qfx");
        std::fs::write(&path, V1).unwrap();

        import_file(&path, &sites(), &Scrubber::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(is_already_imported(&written));
    }

    #[test]
    fn test_import_file_accepts_windows_1252() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.qfx");
        let raw = b"OFXHEADER:100\r\nCHARSET:1252\r\nNEWFILEUID:NONE\r\n\r\n<OFX><FID>1234<NAME>Caf\xE9</OFX>";
        std::fs::write(&path, raw).unwrap();

        let outcome = import_file(&path, &sites(), &Scrubber::default()).unwrap();
        assert!(outcome.scrubbed);
        assert_eq!(outcome.site.as_deref(), Some("ByFid"));

        let written = std::fs::read(&path).unwrap();
        let expected = b"OFXHEADER:100\r\nCHARSET:1252\r\nNEWFILEUID:PSIMPORT\r\n\r\n<OFX><FID>1234<NAME>Caf\xE9</OFX>";
        assert_eq!(written, expected.to_vec());
    }
}
