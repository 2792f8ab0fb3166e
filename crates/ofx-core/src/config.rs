//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! TOML 파일을 기본으로 하고 `OFXGET__` 접두 환경 변수로 재정의합니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{OfxError, OfxResult};
use crate::number::NumberLocale;
use crate::types::{AccountDescriptor, SiteProfile};

/// 인증서 검증을 끄는 프로세스 전역 환경 변수 (진단 전용).
pub const HTTPS_VERIFY_ENV: &str = "OFXGET_HTTPS_VERIFY";

/// 기본 User-Agent.
pub const DEFAULT_USER_AGENT: &str = "InetClntApp/3.0";

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 다운로드 설정
    #[serde(default)]
    pub download: DownloadConfig,
    /// 스크럽 설정
    #[serde(default)]
    pub scrub: ScrubConfig,
    /// HTTP 전송 설정
    #[serde(default)]
    pub http: HttpConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 클라이언트 UID 저장 파일
    #[serde(default = "default_client_uid_store")]
    pub client_uid_store: PathBuf,
    /// 사이트 프로필 (이름 → 프로필)
    #[serde(default)]
    pub sites: BTreeMap<String, SiteProfile>,
    /// 다운로드 대상 계좌
    #[serde(default)]
    pub accounts: Vec<AccountDescriptor>,
}

fn default_client_uid_store() -> PathBuf {
    PathBuf::from("./client_uids.json")
}

/// 다운로드 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// 응답 파일 저장 디렉토리
    pub xfr_dir: PathBuf,
    /// 수동 가져오기 디렉토리
    pub import_dir: PathBuf,
    /// 기본 조회 기간 (일)
    pub default_interval_days: u32,
    /// 로그인 실패 시 같은 사이트/사용자 조합 건너뛰기
    pub skip_failed_logon: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            xfr_dir: PathBuf::from("./xfr"),
            import_dir: PathBuf::from("./import"),
            default_interval_days: 31,
            skip_failed_logon: true,
        }
    }
}

/// 스크럽 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScrubConfig {
    /// 0원 거래 제거 (전역 기본값, 사이트별 재정의 가능)
    #[serde(default)]
    pub skip_zero_transactions: bool,
    /// 스크럽 알림을 debug 레벨로 낮춤
    #[serde(default)]
    pub quiet: bool,
    /// 숫자 표기 로케일
    #[serde(default)]
    pub number_locale: NumberLocale,
}

/// HTTP 전송 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// TLS 인증서 검증
    pub verify_tls: bool,
    /// 기본 User-Agent
    pub default_user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            verify_tls: true,
            default_user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// 환경 변수 재정의를 반영한 인증서 검증 여부.
    ///
    /// `OFXGET_HTTPS_VERIFY=0`이면 설정 파일과 무관하게 검증을 끕니다.
    pub fn effective_verify_tls(&self) -> bool {
        match std::env::var(HTTPS_VERIFY_ENV) {
            Ok(v) if v.trim() == "0" => false,
            _ => self.verify_tls,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> OfxResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("OFXGET")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.check()?;
        Ok(app)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미적용).
    pub fn from_toml_str(raw: &str) -> OfxResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.check()?;
        Ok(app)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> OfxResult<Self> {
        Self::load("config/ofxget.toml")
    }

    /// 이름으로 사이트 프로필 조회.
    ///
    /// 설정 소스에 따라 키의 대소문자가 바뀔 수 있으므로 대소문자를 무시하고 찾습니다.
    pub fn site(&self, name: &str) -> OfxResult<&SiteProfile> {
        self.sites
            .get(name)
            .or_else(|| {
                self.sites
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, site)| site)
            })
            .ok_or_else(|| OfxError::NotFound(format!("site '{}' is not defined", name)))
    }

    /// 모든 계좌가 정의된 사이트를 참조하는지 확인합니다.
    fn check(&self) -> OfxResult<()> {
        for account in &self.accounts {
            if self.site(&account.site).is_err() {
                return Err(OfxError::Config(format!(
                    "account {} references unknown site '{}'",
                    account.query_number(),
                    account.site
                )));
            }
        }
        Ok(())
    }
}
