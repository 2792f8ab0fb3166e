//! 금융기관 사이트 프로필.
//!
//! 사이트 프로필은 기관별 OFX 서버 설정을 담는 읽기 전용 레코드입니다.
//! 클라이언트는 이 값을 절대 수정하지 않습니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 기본 애플리케이션 ID (서버가 인식하는 클라이언트 식별자).
pub const DEFAULT_APP_ID: &str = "QWIN";
/// 기본 애플리케이션 버전.
pub const DEFAULT_APP_VERSION: &str = "2700";
/// 기본 OFX 프로토콜 버전.
pub const DEFAULT_OFX_VERSION: &str = "102";
/// 계좌 정보 요청의 기본 기준일.
pub const DEFAULT_DTACCTUP: &str = "19700101";

/// 사이트가 지원하는 메시지 집합.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Capability {
    /// 로그인 (항상 존재)
    Signon,
    /// 은행 계좌 명세서
    Bastmt,
    /// 신용카드 명세서
    Ccstmt,
    /// 투자 계좌 명세서
    Invstmt,
    /// 계좌 목록 조회
    Acctinfo,
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SIGNON" => Ok(Capability::Signon),
            "BASTMT" => Ok(Capability::Bastmt),
            "CCSTMT" => Ok(Capability::Ccstmt),
            "INVSTMT" => Ok(Capability::Invstmt),
            "ACCTINFO" => Ok(Capability::Acctinfo),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// 명세서 요청 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// 은행 계좌
    Bank,
    /// 신용카드
    CreditCard,
    /// 투자 계좌
    Investment,
}

impl StatementKind {
    /// 플러그인 선택에 쓰이는 계좌 유형 토큰.
    pub fn token(&self) -> &'static str {
        match self {
            StatementKind::Bank => "BASTMT",
            StatementKind::CreditCard => "CCSTMT",
            StatementKind::Investment => "INVSTMT",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// 기관별 OFX 사이트 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// OFX 서버 엔드포인트 URL
    pub url: String,
    /// 프로토콜 버전 (예: "102", "103", "220")
    #[serde(default = "default_ofxver")]
    pub ofxver: String,
    /// 금융기관 조직명 (FI/ORG)
    #[serde(default)]
    pub fiorg: String,
    /// 금융기관 ID (FI/FID)
    #[serde(default)]
    pub fid: String,
    /// 은행 ID (은행 명세서에 필수)
    #[serde(default)]
    pub bankid: String,
    /// 증권사 ID (투자 명세서, 없으면 fiorg 사용)
    #[serde(default)]
    pub brokerid: String,
    /// 지원 메시지 집합
    #[serde(default)]
    pub caps: Vec<Capability>,
    /// 사용자가 지정한 클라이언트 UID
    #[serde(default)]
    pub clientuid: Option<String>,
    /// 계좌 목록 조회 기준일
    #[serde(default)]
    pub dtacctup: Option<String>,
    /// User-Agent 재정의 ("none"이면 헤더 생략)
    #[serde(default)]
    pub useragent: Option<String>,
    /// 최소 조회 기간 (일)
    #[serde(default)]
    pub mininterval: Option<u32>,
    /// 접속 전 대기 시간 (초)
    #[serde(default)]
    pub delay: f64,
    /// DTASOF 시각 보정 (시간)
    #[serde(default)]
    pub timeoffset: f64,
    /// 0원 거래 제거 재정의
    #[serde(default)]
    pub skipzerotrans: Option<bool>,
    /// 애플리케이션 ID
    #[serde(default = "default_appid")]
    pub appid: String,
    /// 애플리케이션 버전
    #[serde(default = "default_appver")]
    pub appver: String,
}

fn default_ofxver() -> String {
    DEFAULT_OFX_VERSION.to_string()
}
fn default_appid() -> String {
    DEFAULT_APP_ID.to_string()
}
fn default_appver() -> String {
    DEFAULT_APP_VERSION.to_string()
}

impl SiteProfile {
    /// URL만 지정한 기본 프로필 생성.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ofxver: default_ofxver(),
            fiorg: String::new(),
            fid: String::new(),
            bankid: String::new(),
            brokerid: String::new(),
            caps: vec![Capability::Signon],
            clientuid: None,
            dtacctup: None,
            useragent: None,
            mininterval: None,
            delay: 0.0,
            timeoffset: 0.0,
            skipzerotrans: None,
            appid: default_appid(),
            appver: default_appver(),
        }
    }

    /// 프로토콜 버전 설정.
    pub fn with_version(mut self, ofxver: impl Into<String>) -> Self {
        self.ofxver = ofxver.into();
        self
    }

    /// 지원 메시지 집합 추가.
    pub fn with_capability(mut self, cap: Capability) -> Self {
        if !self.caps.contains(&cap) {
            self.caps.push(cap);
        }
        self
    }

    /// 주 버전 문자 ('1' 또는 '2').
    pub fn major_version(&self) -> char {
        self.ofxver.trim().chars().next().unwrap_or('1')
    }

    /// XML(2.x) 인코딩을 사용하는지 여부.
    pub fn is_xml(&self) -> bool {
        self.major_version() == '2'
    }

    /// 숫자 버전 (파싱 실패 시 None).
    pub fn numeric_version(&self) -> Option<u32> {
        self.ofxver.trim().parse().ok()
    }

    /// 로그인 메시지에 CLIENTUID가 필요한지 여부 (버전 103 이상).
    pub fn requires_client_uid(&self) -> bool {
        self.numeric_version().map(|v| v > 102).unwrap_or(false)
    }

    /// 특정 메시지 집합 지원 여부.
    pub fn supports(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }

    /// 계좌에 사용할 명세서 유형.
    ///
    /// 우선순위: 신용카드 → 투자 → 은행.
    pub fn statement_kind(&self) -> Option<StatementKind> {
        if self.supports(Capability::Ccstmt) {
            Some(StatementKind::CreditCard)
        } else if self.supports(Capability::Invstmt) {
            Some(StatementKind::Investment)
        } else if self.supports(Capability::Bastmt) {
            Some(StatementKind::Bank)
        } else {
            None
        }
    }

    /// 투자 명세서에 쓸 증권사 ID (없으면 fiorg).
    pub fn broker_or_org(&self) -> Option<&str> {
        [self.brokerid.as_str(), self.fiorg.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// 계좌 목록 조회 기준일.
    pub fn dtacctup_or_default(&self) -> &str {
        self.dtacctup
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_DTACCTUP)
    }

    /// 전송할 User-Agent 헤더 값.
    ///
    /// 재정의가 없으면 기본값, "none"이면 `None`.
    pub fn user_agent(&self, default: &str) -> Option<String> {
        match self.useragent.as_deref().map(str::trim) {
            None | Some("") => Some(default.to_string()),
            Some(ua) if ua.eq_ignore_ascii_case("none") => None,
            Some(ua) => Some(ua.to_string()),
        }
    }

    /// 요청 조회 기간 (사이트 최소값 적용).
    pub fn effective_interval(&self, interval_days: u32) -> u32 {
        match self.mininterval {
            Some(min) => interval_days.max(min),
            None => interval_days,
        }
    }

    /// 0원 거래 제거 여부.
    ///
    /// 사이트에서 명시적으로 끈 경우 전역 설정보다 우선합니다.
    pub fn skip_zero_transactions(&self, global: bool) -> bool {
        match self.skipzerotrans {
            Some(site) => site,
            None => global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_helpers() {
        let site = SiteProfile::new("https://ofx.example.com/cgi");
        assert_eq!(site.major_version(), '1');
        assert!(!site.is_xml());
        assert!(!site.requires_client_uid());

        let site = site.with_version("103");
        assert!(site.requires_client_uid());

        let site = site.with_version("220");
        assert!(site.is_xml());
        assert!(site.requires_client_uid());
    }

    #[test]
    fn test_statement_kind_priority() {
        let site = SiteProfile::new("https://x")
            .with_capability(Capability::Bastmt)
            .with_capability(Capability::Ccstmt);
        assert_eq!(site.statement_kind(), Some(StatementKind::CreditCard));

        let site = SiteProfile::new("https://x")
            .with_capability(Capability::Bastmt)
            .with_capability(Capability::Invstmt);
        assert_eq!(site.statement_kind(), Some(StatementKind::Investment));

        assert_eq!(SiteProfile::new("https://x").statement_kind(), None);
    }

    #[test]
    fn test_user_agent_override() {
        let mut site = SiteProfile::new("https://x");
        assert_eq!(site.user_agent("Default/1.0").as_deref(), Some("Default/1.0"));

        site.useragent = Some("NONE".to_string());
        assert_eq!(site.user_agent("Default/1.0"), None);

        site.useragent = Some("Custom/2.0".to_string());
        assert_eq!(site.user_agent("Default/1.0").as_deref(), Some("Custom/2.0"));
    }

    #[test]
    fn test_skip_zero_transactions_override() {
        let mut site = SiteProfile::new("https://x");
        assert!(site.skip_zero_transactions(true));
        assert!(!site.skip_zero_transactions(false));

        site.skipzerotrans = Some(false);
        assert!(!site.skip_zero_transactions(true));

        site.skipzerotrans = Some(true);
        assert!(site.skip_zero_transactions(false));
    }

    #[test]
    fn test_broker_falls_back_to_fiorg() {
        let mut site = SiteProfile::new("https://x");
        assert_eq!(site.broker_or_org(), None);
        site.fiorg = "Vanguard".to_string();
        assert_eq!(site.broker_or_org(), Some("Vanguard"));
        site.brokerid = "vanguard.com".to_string();
        assert_eq!(site.broker_or_org(), Some("vanguard.com"));
    }

    #[test]
    fn test_effective_interval() {
        let mut site = SiteProfile::new("https://x");
        assert_eq!(site.effective_interval(30), 30);
        site.mininterval = Some(60);
        assert_eq!(site.effective_interval(30), 60);
        assert_eq!(site.effective_interval(90), 90);
    }

    #[test]
    fn test_capability_parsing() {
        assert_eq!("ccstmt".parse::<Capability>().unwrap(), Capability::Ccstmt);
        assert!("bogus".parse::<Capability>().is_err());
    }
}
