//! 응답 문서 구조 검증.
//!
//! 검사 순서:
//! 1. `<OFX>` 여는 태그와 이후의 `</OFX>` 닫는 태그 존재
//! 2. 상태 섹션에 `<SEVERITY>ERROR`가 없음
//! 3. `<INVPOS>`가 있으면 `<SECLIST>`도 존재 (없으면 소비 애플리케이션이 중단됨)
//!
//! 공백과 줄바꿈은 검사 전에 제거하므로 태그와 값 사이의 개행에 영향받지 않습니다.

use thiserror::Error;

/// 검증 실패 사유. `Display` 출력이 사람이 읽을 수 있는 사유 문자열입니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 빈 문서
    #[error("Empty OFX response")]
    Empty,

    /// 봉투(envelope) 태그 누락 또는 순서 오류
    #[error("Invalid OFX statement: missing <OFX>...</OFX> envelope")]
    MissingEnvelope,

    /// 서버가 보고한 에러 심각도
    #[error("OFX message contains ERROR condition (code: {code}, message: {message})")]
    ServerError { code: String, message: String },

    /// 보유 종목은 있으나 종목 목록 누락
    #[error("OFX message contains <INVPOS> but no <SECLIST>")]
    MissingSecurityList,
}

/// OFX 응답 텍스트를 검증합니다.
///
/// 성공하면 `Ok(())`, 실패하면 사유를 담은 [`ValidationError`]를 반환합니다.
pub fn validate(text: &str) -> Result<(), ValidationError> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.is_empty() {
        return Err(ValidationError::Empty);
    }

    let open = compact.find("<OFX>");
    let close = compact.rfind("</OFX>");
    match (open, close) {
        (Some(o), Some(c)) if o < c => {}
        _ => return Err(ValidationError::MissingEnvelope),
    }

    if compact.contains("<SEVERITY>ERROR") {
        let (code, message) = error_status(text);
        return Err(ValidationError::ServerError { code, message });
    }

    if compact.contains("<INVPOS>") && !compact.contains("<SECLIST>") {
        return Err(ValidationError::MissingSecurityList);
    }

    Ok(())
}

/// 에러 심각도를 가진 첫 STATUS 섹션의 CODE/MESSAGE 값.
fn error_status(text: &str) -> (String, String) {
    let upper = text.to_ascii_uppercase();
    let unknown = || ("unknown".to_string(), String::new());

    let mut search_from = 0;
    while let Some(rel) = upper[search_from..].find("<SEVERITY>") {
        let sev_pos = search_from + rel;
        let value_start = sev_pos + "<SEVERITY>".len();
        if upper[value_start..].trim_start().starts_with("ERROR") {
            let section_start = upper[..sev_pos].rfind("<STATUS>").unwrap_or(0);
            let section_end = upper[sev_pos..]
                .find("</STATUS>")
                .map(|p| sev_pos + p)
                .unwrap_or(upper.len());
            let section = &text[section_start..section_end];
            let section_upper = &upper[section_start..section_end];

            let code = tag_value(section, section_upper, "<CODE>");
            let message = tag_value(section, section_upper, "<MESSAGE>");
            return (code.unwrap_or_else(|| "unknown".to_string()), message.unwrap_or_default());
        }
        search_from = value_start;
    }

    unknown()
}

fn tag_value(section: &str, section_upper: &str, tag: &str) -> Option<String> {
    let start = section_upper.find(tag)? + tag.len();
    let rest = &section[start..];
    let end = rest.find('<').unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}
