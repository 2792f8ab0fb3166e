//! 로케일을 고려한 금액/수량 파싱.
//!
//! 기관에 따라 `1,234.50` 처럼 천 단위 구분자가 포함된 값을 보내므로
//! 설정된 로케일의 구분자를 제거한 뒤 `Decimal`로 파싱합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// 숫자 표기 로케일.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    /// 천 단위 구분자
    #[serde(default = "default_thousands", deserialize_with = "deserialize_separator")]
    pub thousands_separator: char,
    /// 소수점 구분자
    #[serde(default = "default_decimal", deserialize_with = "deserialize_separator")]
    pub decimal_separator: char,
}

fn deserialize_separator<'de, D>(deserializer: D) -> Result<char, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(serde::de::Error::custom(format!(
            "separator must be a single character, got '{}'",
            raw
        ))),
    }
}

fn default_thousands() -> char {
    ','
}
fn default_decimal() -> char {
    '.'
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self {
            thousands_separator: default_thousands(),
            decimal_separator: default_decimal(),
        }
    }
}

impl NumberLocale {
    /// 구분자를 지정해 생성.
    pub fn new(thousands_separator: char, decimal_separator: char) -> Self {
        Self {
            thousands_separator,
            decimal_separator,
        }
    }

    /// 문자열을 `Decimal`로 파싱합니다. 숫자가 아니면 `None`.
    pub fn parse(&self, raw: &str) -> Option<Decimal> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| *c != self.thousands_separator)
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect();
        let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);

        Decimal::from_str(normalized).ok()
    }

    /// 값이 정확히 0인지 여부. 숫자가 아니면 `false`.
    pub fn is_zero(&self, raw: &str) -> bool {
        self.parse(raw).map(|v| v.is_zero()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_plain_and_signed() {
        let locale = NumberLocale::default();
        assert_eq!(locale.parse("500"), Some(dec!(500)));
        assert_eq!(locale.parse("-10"), Some(dec!(-10)));
        assert_eq!(locale.parse("+2.5"), Some(dec!(2.5)));
        assert_eq!(locale.parse(" 0.00\r\n"), Some(dec!(0.00)));
    }

    #[test]
    fn test_parse_thousands_separator() {
        let locale = NumberLocale::default();
        assert_eq!(locale.parse("1,234.50"), Some(dec!(1234.50)));

        let euro = NumberLocale::new('.', ',');
        assert_eq!(euro.parse("1.234,50"), Some(dec!(1234.50)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let locale = NumberLocale::default();
        assert_eq!(locale.parse(""), None);
        assert_eq!(locale.parse("N/A"), None);
    }

    #[test]
    fn test_is_zero() {
        let locale = NumberLocale::default();
        assert!(locale.is_zero("0.00"));
        assert!(locale.is_zero("-0"));
        assert!(!locale.is_zero("0.01"));
        assert!(!locale.is_zero("abc"));
    }
}
