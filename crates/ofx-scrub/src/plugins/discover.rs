//! Discover 카드/은행 응답 보정.
//!
//! - FITID가 거래마다 고유하지 않으므로 순번을 붙여 문서 안에서 고유하게 만듭니다.
//!   카드 명세서의 FITID 끝 5자는 가변 꼬리여서 잘라낸 뒤 순번을 붙입니다.
//! - 은행 명세서에서 `NAME`이 `Check 1234` 형태인 출금은 수표 거래로 재분류합니다.

use ofx_core::StatementKind;

use crate::document::{split_padded, split_word, Document};
use crate::error::ScrubResult;
use crate::plugins::InstitutionPlugin;
use crate::state::ScrubState;

/// 카드 FITID에서 잘라내는 꼬리 길이.
const FITID_TAIL: usize = 5;

/// Discover 플러그인.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverPlugin;

impl InstitutionPlugin for DiscoverPlugin {
    fn name(&self) -> &str {
        "discover"
    }

    fn matches(&self, site_url: &str, _statement: Option<StatementKind>) -> bool {
        site_url.contains("DISCOVERCARD")
    }

    fn apply(
        &self,
        ofx: &str,
        statement: Option<StatementKind>,
        state: &mut ScrubState,
    ) -> ScrubResult<String> {
        let mut doc = Document::parse(ofx);
        let truncate = statement == Some(StatementKind::CreditCard);

        for open in doc.opens("FITID") {
            let Some(value_idx) = doc.value_index(open) else { continue };
            let Some(raw) = doc.text(value_idx) else { continue };

            let (word, rest) = split_word(raw);
            if word.is_empty() {
                continue;
            }
            let base = if truncate { strip_tail(word) } else { word };
            let unique = state.claim_unique(base);
            let replaced = format!("{}{}", unique, rest);
            doc.set_text(value_idx, replaced);
        }

        if statement == Some(StatementKind::Bank) {
            reclassify_checks(&mut doc);
        }

        Ok(doc.to_string())
    }
}

fn strip_tail(fitid: &str) -> &str {
    let keep = fitid.chars().count().saturating_sub(FITID_TAIL);
    let end = fitid
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(fitid.len());
    &fitid[..end]
}

/// `Check 1234 ...` 형태의 이름을 (수표 번호, 나머지)로 분해합니다.
fn parse_check_name(name: &str) -> Option<(&str, &str)> {
    if name.len() < 5 || !name.is_char_boundary(5) || !name[..5].eq_ignore_ascii_case("check") {
        return None;
    }
    let after = &name[5..];
    let digits_start = after.trim_start_matches(' ');
    if digits_start.len() == after.len() {
        return None;
    }
    let digits_len = digits_start
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits_start.len());
    if digits_len == 0 {
        return None;
    }
    Some(digits_start.split_at(digits_len))
}

fn reclassify_checks(doc: &mut Document) {
    let closed = doc.closes_leaves();

    for open in doc.opens("STMTTRN").into_iter().rev() {
        let body = doc.block_body(open);
        let Some(type_idx) = doc.find_open_in("TRNTYPE", body.clone()) else { continue };
        let Some(name_idx) = doc.find_open_in("NAME", body) else { continue };
        let (Some(type_value), Some(name_value)) = (doc.value_index(type_idx), doc.value_index(name_idx)) else {
            continue;
        };

        let Some(type_raw) = doc.text(type_value) else { continue };
        let (trntype, type_rest) = split_word(type_raw);
        if !trntype.eq_ignore_ascii_case("DEBIT") {
            continue;
        }
        let type_replaced = format!("CHECK{}", type_rest);

        let Some(name_raw) = doc.text(name_value) else { continue };
        let (lead, name, trail) = split_padded(name_raw);
        let Some((number, remainder)) = parse_check_name(name) else { continue };
        let name_replaced = format!("{}{}{}{}", lead, &name[..5], remainder, trail);
        let number = number.to_string();

        // 텍스트 교체는 토큰 수를 바꾸지 않으므로 삽입보다 먼저 합니다.
        // NAME과 TRNTYPE의 순서는 기관마다 다릅니다.
        doc.set_text(type_value, type_replaced);
        doc.set_text(name_value, name_replaced);
        doc.insert_all(name_idx, Document::leaf_tokens("CHECKNUM", &number, closed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(ofx: &str, kind: StatementKind) -> String {
        let mut state = ScrubState::new();
        DiscoverPlugin.apply(ofx, Some(kind), &mut state).unwrap()
    }

    #[test]
    fn test_card_fitids_are_truncated_and_sequenced() {
        let ofx = "<OFX><STMTTRN><FITID>FIT12345XXXXX\r\n</STMTTRN><STMTTRN><FITID>FIT12345YYYYY\r\n</STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::CreditCard);
        assert!(out.contains("<FITID>FIT123450\r\n"));
        assert!(out.contains("<FITID>FIT123451\r\n"));
    }

    #[test]
    fn test_short_fitid_truncates_to_empty() {
        assert_eq!(strip_tail("ABC"), "");
        assert_eq!(strip_tail("ABCDEFG"), "AB");
    }

    #[test]
    fn test_bank_fitids_keep_full_value() {
        let ofx = "<OFX><STMTTRN><FITID>ABCDEF</STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::Bank);
        assert_eq!(out, "<OFX><STMTTRN><FITID>ABCDEF0</STMTTRN></OFX>");
    }

    #[test]
    fn test_check_debit_is_reclassified() {
        let ofx = "<OFX><STMTTRN>\r\n<TRNTYPE>DEBIT\r\n<NAME>Check 1042 rent\r\n</STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::Bank);
        assert_eq!(
            out,
            "<OFX><STMTTRN>\r\n<TRNTYPE>CHECK\r\n<CHECKNUM>1042<NAME>Check rent\r\n</STMTTRN></OFX>"
        );
    }

    #[test]
    fn test_check_reclassified_when_name_precedes_type() {
        let ofx = "<OFX><STMTTRN><NAME>Check 5<TRNTYPE>DEBIT<TRNAMT>-1</STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::Bank);
        assert_eq!(
            out,
            "<OFX><STMTTRN><CHECKNUM>5<NAME>Check<TRNTYPE>CHECK<TRNAMT>-1</STMTTRN></OFX>"
        );
    }

    #[test]
    fn test_check_reclassified_in_xml_style() {
        let ofx = "<OFX><STMTTRN><TRNTYPE>DEBIT</TRNTYPE><NAME>CHECK 77</NAME></STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::Bank);
        assert_eq!(
            out,
            "<OFX><STMTTRN><TRNTYPE>CHECK</TRNTYPE><CHECKNUM>77</CHECKNUM><NAME>CHECK</NAME></STMTTRN></OFX>"
        );
    }

    #[test]
    fn test_non_check_names_are_untouched() {
        let ofx = "<OFX><STMTTRN><TRNTYPE>DEBIT<NAME>Checkers Pizza</STMTTRN><STMTTRN><TRNTYPE>CREDIT<NAME>Check 5</STMTTRN></OFX>";
        let out = apply(ofx, StatementKind::Bank);
        assert_eq!(out, ofx);
    }

    #[test]
    fn test_card_statement_skips_reclassification() {
        let ofx = "<OFX><STMTTRN><TRNTYPE>DEBIT<NAME>Check 5</STMTTRN></OFX>";
        assert_eq!(apply(ofx, StatementKind::CreditCard), ofx);
    }

    #[test]
    fn test_parse_check_name() {
        assert_eq!(parse_check_name("Check 12"), Some(("12", "")));
        assert_eq!(parse_check_name("check  9 x"), Some(("9", " x")));
        assert_eq!(parse_check_name("Check12"), None);
        assert_eq!(parse_check_name("Check "), None);
    }
}
