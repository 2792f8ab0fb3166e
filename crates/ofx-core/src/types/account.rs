//! 계좌 정의.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// 다운로드 대상 계좌.
///
/// 계좌번호에는 사용자가 붙인 `:xx` 버전 접미사가 있을 수 있습니다.
/// 접미사는 서버 조회 전에 제거되고, 결과 파일에는 다시 복원됩니다.
///
/// # 보안
/// - `password`는 `SecretString`으로 보관되어 `Debug` 출력에 노출되지 않습니다.
#[derive(Debug, Deserialize)]
pub struct AccountDescriptor {
    /// 사이트 이름 (설정의 `sites` 키)
    pub site: String,
    /// 계좌번호 (선택적 `:버전` 접미사 포함, 빈 값이면 계좌 목록 조회)
    #[serde(default)]
    pub account: String,
    /// 계좌 유형 (은행 명세서의 ACCTTYPE, 예: CHECKING)
    #[serde(default)]
    pub account_type: String,
    /// 로그인 사용자명
    pub username: String,
    /// 로그인 비밀번호
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into()))
}

impl AccountDescriptor {
    /// 새 계좌 정의 생성.
    pub fn new(
        site: impl Into<String>,
        account: impl Into<String>,
        account_type: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password: String = password.into();
        Self {
            site: site.into(),
            account: account.into(),
            account_type: account_type.into(),
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// 서버에 전송할 계좌번호 (버전 접미사 제거).
    pub fn query_number(&self) -> &str {
        self.account.split(':').next().unwrap_or("").trim()
    }

    /// 버전 접미사가 붙어 있는지 여부.
    pub fn has_version_suffix(&self) -> bool {
        self.query_number() != self.account.trim()
    }

    /// 계좌 목록 조회 요청인지 여부 (계좌번호 없음).
    pub fn is_discovery(&self) -> bool {
        self.query_number().is_empty()
    }
}
