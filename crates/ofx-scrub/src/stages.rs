//! 파이프라인 단계.
//!
//! 각 단계는 [`Document`]를 직접 수정하고 변경한 항목 수를 반환합니다.
//! 시각 보정([`shift_as_of_times`])을 제외하면 모든 단계는 두 번 적용해도 결과가 같습니다.

use chrono::{Duration, NaiveDateTime};
use ofx_core::NumberLocale;
use tracing::warn;

use crate::document::{split_padded, split_word, Document, Token};

/// 지원하지 않는 소비 애플리케이션에서 문제를 일으키는 태그.
pub const UNSUPPORTED_TAGS: [&str; 4] = ["CORRECTACTION", "CORRECTFITID", "REFNUM", "SIC"];

/// 시각이 없는 날짜에 채우는 정오 시각.
const NOON: &str = "120000";

const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// 금액/수량의 부호 요구 사항.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Positive,
    Negative,
}

/// 헤더 영역의 `LABEL: value` 에서 콜론 뒤 공백을 제거합니다.
///
/// 첫 태그 이전의 텍스트에만 적용합니다.
pub fn strip_header_spaces(doc: &mut Document) -> usize {
    let header_len = doc.header_len();
    let mut changed = 0;

    for idx in 0..header_len {
        let Some(text) = doc.text(idx) else { continue };

        let mut out = String::with_capacity(text.len());
        let mut touched = false;
        for line in text.split_inclusive('\n') {
            match strip_line(line) {
                Some(stripped) => {
                    out.push_str(&stripped);
                    touched = true;
                }
                None => out.push_str(line),
            }
        }

        if touched {
            doc.set_text(idx, out);
            changed += 1;
        }
    }

    changed
}

fn strip_line(line: &str) -> Option<String> {
    let colon = line.find(':')?;
    let (label, rest) = line.split_at(colon);
    if label.is_empty() {
        return None;
    }

    let after = &rest[1..];
    let value = after.trim_start_matches([' ', '\t']);
    if value.len() == after.len() {
        return None;
    }
    // 콜론 뒤에 줄바꿈만 남으면 그대로 둡니다.
    if value.is_empty() || value == "\n" {
        return None;
    }

    Some(format!("{}:{}", label, value))
}

/// 시각 부분이 없거나 자정(`000000`)인 날짜 값을 같은 날 정오로 바꿉니다.
///
/// `DT`로 시작하는 모든 태그가 대상이며 8자리 날짜 이후의 내용은 버려집니다.
pub fn normalize_null_times(doc: &mut Document) -> usize {
    let mut changed = 0;

    for open in doc.opens_where(|name| name.starts_with("DT")) {
        let Some(value_idx) = doc.value_index(open) else { continue };
        let Some(raw) = doc.text(value_idx) else { continue };

        let (word, rest) = split_word(raw);
        if word.len() < 8 || !word.is_char_boundary(8) {
            continue;
        }
        let time = &word[8..];
        if !(time.is_empty() || time.starts_with("000000")) {
            continue;
        }

        let normalized = format!("{}{}", &word[..8], NOON);
        if normalized != word {
            let replaced = format!("{}{}", normalized, rest);
            doc.set_text(value_idx, replaced);
            changed += 1;
        }
    }

    changed
}

/// `DTASOF` 값을 주어진 시간(시 단위, 소수 가능)만큼 이동합니다.
///
/// 소수 초는 버리고 `[...]` 시간대 표기는 그대로 다시 붙입니다.
/// 해석할 수 없는 값은 경고만 남기고 유지합니다.
pub fn shift_as_of_times(doc: &mut Document, hours: f64) -> usize {
    if hours == 0.0 || !hours.is_finite() {
        return 0;
    }
    let offset = Duration::seconds((hours * 3600.0).round() as i64);
    let mut changed = 0;

    for open in doc.opens("DTASOF") {
        let Some(value_idx) = doc.value_index(open) else { continue };
        let Some(raw) = doc.text(value_idx) else { continue };

        let (word, rest) = split_word(raw);
        let (stamp, tz) = match word.find('[') {
            Some(pos) => word.split_at(pos),
            None => (word, ""),
        };
        let stamp = stamp.split('.').next().unwrap_or(stamp);

        let shifted = NaiveDateTime::parse_from_str(stamp, DATETIME_FORMAT)
            .ok()
            .and_then(|dt| dt.checked_add_signed(offset));
        match shifted {
            Some(dt) => {
                let replaced = format!("{}{}{}", dt.format(DATETIME_FORMAT), tz, rest);
                doc.set_text(value_idx, replaced);
                changed += 1;
            }
            None => warn!(value = %word, "Unable to shift DTASOF value"),
        }
    }

    changed
}

/// 백필에 쓸 현재 시각 문자열 (`%Y%m%d%H%M00`, 자정이면 정오).
pub fn statement_end_stamp(now: NaiveDateTime) -> String {
    let stamp = now.format("%Y%m%d%H%M00").to_string();
    if stamp.ends_with("000000") {
        format!("{}{}", &stamp[..8], NOON)
    } else {
        stamp
    }
}

/// `DTSTART`는 있지만 `DTEND`가 없는 문서에 현재 시각의 `DTEND`를 추가합니다.
pub fn backfill_statement_end(doc: &mut Document, now: NaiveDateTime) -> usize {
    if !doc.contains_open("DTSTART") || doc.contains_open("DTEND") {
        return 0;
    }

    let stamp = statement_end_stamp(now);
    let mut changed = 0;

    // 뒤에서부터 삽입해야 앞쪽 위치가 유지됩니다.
    for open in doc.opens("DTSTART").into_iter().rev() {
        let Some(value_idx) = doc.value_index(open) else { continue };
        let Some(raw) = doc.text(value_idx) else { continue };

        let (word, rest) = split_word(raw);
        if word.is_empty() {
            continue;
        }

        if doc.is_close(value_idx + 1, "DTSTART") {
            doc.insert_all(value_idx + 2, Document::leaf_tokens("DTEND", &stamp, true));
        } else {
            let (word, rest) = (word.to_string(), rest.to_string());
            doc.set_text(value_idx, word);
            doc.insert_all(
                value_idx + 1,
                Document::leaf_tokens("DTEND", &format!("{}{}", stamp, rest), false),
            );
        }
        changed += 1;
    }

    changed
}

/// 값 텍스트의 부호를 요구 사항에 맞춥니다. 뒤집었으면 `true`.
fn enforce_sign(doc: &mut Document, open: usize, want: Sign, locale: &NumberLocale) -> bool {
    let Some(value_idx) = doc.value_index(open) else { return false };
    let Some(raw) = doc.text(value_idx) else { return false };

    let (lead, core, trail) = split_padded(raw);
    let Some(value) = locale.parse(core) else { return false };

    let wrong = match want {
        Sign::Positive => value.is_sign_negative() && !value.is_zero(),
        Sign::Negative => value.is_sign_positive() && !value.is_zero(),
    };
    if !wrong {
        return false;
    }

    let replaced = format!("{}{}{}", lead, -value, trail);
    doc.set_text(value_idx, replaced);
    true
}

/// 블록 안의 첫 UNITS/TOTAL에 부호 요구 사항을 적용합니다.
fn enforce_block_signs(
    doc: &mut Document,
    block: &str,
    units: Sign,
    total: Sign,
    locale: &NumberLocale,
) -> usize {
    let mut changed = 0;
    for open in doc.opens(block) {
        let body = doc.block_body(open);
        if let Some(idx) = doc.find_open_in("UNITS", body.clone()) {
            if enforce_sign(doc, idx, units, locale) {
                changed += 1;
            }
        }
        if let Some(idx) = doc.find_open_in("TOTAL", body) {
            if enforce_sign(doc, idx, total, locale) {
                changed += 1;
            }
        }
    }
    changed
}

/// 투자 명세서의 매수/매도 거래 부호를 교정합니다.
///
/// 매수는 수량 양수/합계 음수, 매도는 수량 음수/합계 양수여야 합니다.
/// 투자 명세서 응답(`INVSTMTTRNRS`)이 없으면 아무것도 하지 않습니다.
pub fn correct_trade_signs(doc: &mut Document, locale: &NumberLocale) -> usize {
    if !doc.contains_open("INVSTMTTRNRS") {
        return 0;
    }
    enforce_block_signs(doc, "INVBUY", Sign::Positive, Sign::Negative, locale)
        + enforce_block_signs(doc, "INVSELL", Sign::Negative, Sign::Positive, locale)
}

/// 재투자 거래의 부호를 교정합니다 (수량 양수, 합계 음수).
pub fn correct_reinvest_signs(doc: &mut Document, locale: &NumberLocale) -> usize {
    enforce_block_signs(doc, "REINVEST", Sign::Positive, Sign::Negative, locale)
}

/// 금액이 0인 `STMTTRN` 블록을 통째로 제거합니다.
pub fn remove_zero_transactions(doc: &mut Document, locale: &NumberLocale) -> usize {
    let mut removed = 0;

    for open in doc.opens("STMTTRN").into_iter().rev() {
        let Some(end) = doc.block_end(open) else { continue };
        let Some(amount_idx) = doc.find_open_in("TRNAMT", open + 1..end) else { continue };

        let is_zero = doc
            .trimmed_value(amount_idx)
            .map(|v| locale.is_zero(v))
            .unwrap_or(false);
        if is_zero {
            doc.remove_range(open..end + 1);
            removed += 1;
        }
    }

    removed
}

/// 일반 정리 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// 제거한 미지원 태그 수
    pub removed_tags: usize,
    /// 이스케이프한 앰퍼샌드가 있는 텍스트 수
    pub escaped_texts: usize,
    /// `OTHER`로 채운 거래 유형 수
    pub filled_types: usize,
}

impl CleanupReport {
    /// 변경 총합.
    pub fn total(&self) -> usize {
        self.removed_tags + self.escaped_texts + self.filled_types
    }
}

/// 미지원 태그 제거, 앰퍼샌드 이스케이프, 빈 거래 유형 채우기.
pub fn general_cleanup(doc: &mut Document) -> CleanupReport {
    CleanupReport {
        removed_tags: remove_unsupported_tags(doc),
        escaped_texts: doc.map_texts(escape_ampersands),
        filled_types: fill_missing_trntype(doc),
    }
}

fn remove_unsupported_tags(doc: &mut Document) -> usize {
    let mut removed = 0;
    let mut idx = doc.len();

    while idx > 0 {
        idx -= 1;
        let Some(tag) = doc.tag(idx) else { continue };
        if !UNSUPPORTED_TAGS.contains(&tag.name()) {
            continue;
        }

        // 여는 태그는 뒤따르는 값 텍스트까지 제거
        let end = match doc.value_index(idx) {
            Some(value_idx) if doc.is_open(idx, tag.name()) => value_idx + 1,
            _ => idx + 1,
        };
        doc.remove_range(idx..end);
        removed += 1;
    }

    removed
}

/// `&name;`, `&#123;` 형태의 엔티티가 아닌 `&`를 `&amp;`로 바꿉니다.
pub fn escape_ampersands(text: &str) -> Option<String> {
    if !text.contains('&') {
        return None;
    }

    let mut out = String::with_capacity(text.len() + 8);
    for (pos, ch) in text.char_indices() {
        if ch == '&' && !is_entity(&text[pos + 1..]) {
            out.push_str("&amp;");
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

fn is_entity(after_amp: &str) -> bool {
    let body = after_amp.strip_prefix('#').unwrap_or(after_amp);
    let word_len = body
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    word_len > 0 && body[word_len..].starts_with(';')
}

fn fill_missing_trntype(doc: &mut Document) -> usize {
    let mut filled = 0;

    for open in doc.opens("TRNTYPE").into_iter().rev() {
        match doc.value_index(open) {
            Some(value_idx) => {
                let Some(raw) = doc.text(value_idx) else { continue };
                let (word, rest) = split_word(raw);
                if word.is_empty() || word.eq_ignore_ascii_case("NULL") {
                    let replaced = format!("OTHER{}", rest);
                    doc.set_text(value_idx, replaced);
                    filled += 1;
                }
            }
            None => {
                doc.insert(open + 1, Token::Text("OTHER".to_string()));
                filled += 1;
            }
        }
    }

    filled
}
