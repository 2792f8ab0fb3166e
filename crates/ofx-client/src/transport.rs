//! HTTPS 전송.
//!
//! 한 계좌의 요청마다 쿠키 저장소를 가진 세션을 새로 열고, 같은 세션으로 최대
//! 두 번 전송합니다. 첫 응답에서 세션 쿠키를 받아야 하는 서버를 위한 것이며,
//! 응답이 구조 검증을 통과하면 즉시 멈춥니다. 2.x 사이트의 유효한 응답은 1.x 헤더로
//! 다시 감싸 저장합니다.
//!
//! 전송 계층의 실패(연결 거부, 타임아웃, TLS)는 에러로 올리지 않고 로그를 남긴 뒤
//! 실패 결과로 바꿉니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ofx_core::{validate, HttpConfig, SiteProfile};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use reqwest::{Client, Url};
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::message::sgml_header;

/// OFX 콘텐츠 타입.
pub const OFX_CONTENT_TYPE: &str = "application/x-ofx";

/// 같은 세션으로 시도하는 최대 횟수.
pub const MAX_ATTEMPTS: usize = 2;

/// 2.x 응답을 1.x로 다시 감쌀 때 쓰는 버전.
///
/// 1.x 헤더에는 1xx 버전만 올 수 있으므로 사이트의 2xx 버전 대신 고정 값을 씁니다.
const FALLBACK_SGML_VERSION: &str = "102";

/// 전송 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// 응답 파일을 기록했는지 여부
    pub success: bool,
    /// 기록한 파일 (실패 시 `None`)
    pub file: Option<PathBuf>,
}

impl QueryOutcome {
    fn failed() -> Self {
        Self::default()
    }

    fn written(path: &Path) -> Self {
        Self {
            success: true,
            file: Some(path.to_path_buf()),
        }
    }
}

/// 요청 전송 추상화.
#[async_trait]
pub trait Transport: Send + Sync {
    /// 요청을 보내고 응답을 `dest`에 기록합니다.
    async fn query(&self, site: &SiteProfile, request: &str, dest: &Path) -> QueryOutcome;
}

/// HTTP 전송 설정.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// 요청 타임아웃
    pub timeout: Duration,
    /// TLS 인증서 검증
    pub verify_tls: bool,
    /// 사이트가 지정하지 않을 때의 User-Agent
    pub default_user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for HttpSettings {
    fn from(config: &HttpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            verify_tls: config.effective_verify_tls(),
            default_user_agent: config.default_user_agent.clone(),
        }
    }
}

/// reqwest 기반 전송.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    settings: HttpSettings,
}

impl HttpTransport {
    /// 설정으로 생성합니다.
    pub fn new(settings: HttpSettings) -> Self {
        if !settings.verify_tls {
            warn!("TLS certificate verification is disabled");
        }
        Self { settings }
    }

    /// 한 계좌 요청용 세션을 만듭니다.
    fn session(&self) -> ClientResult<Client> {
        let client = Client::builder()
            .timeout(self.settings.timeout)
            .cookie_store(true)
            .http1_only()
            .danger_accept_invalid_certs(!self.settings.verify_tls)
            .build()?;
        Ok(client)
    }

    /// 요청 헤더를 만듭니다.
    pub fn headers(&self, site: &SiteProfile, request: &str) -> ClientResult<HeaderMap> {
        let url = Url::parse(&site.url)
            .map_err(|e| ClientError::Config(format!("invalid site url '{}': {}", site.url, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(ClientError::Config(format!("site url '{}' has no host", site.url)))
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(OFX_CONTENT_TYPE));
        headers.insert(HOST, header_value(&host)?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(request.len()));
        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        headers.insert(ACCEPT, HeaderValue::from_static(OFX_CONTENT_TYPE));
        if let Some(agent) = site.user_agent(&self.settings.default_user_agent) {
            headers.insert(USER_AGENT, header_value(&agent)?);
        }
        Ok(headers)
    }

    async fn exchange(&self, site: &SiteProfile, request: &str) -> Result<String, TransportFailure> {
        let headers = self.headers(site, request).map_err(TransportFailure::without_response)?;
        let session = self.session().map_err(TransportFailure::without_response)?;

        let mut body = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let response = session
                .post(&site.url)
                .headers(headers.clone())
                .body(request.to_string())
                .send()
                .await
                .map_err(|e| TransportFailure::without_response(e.into()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| TransportFailure::with_status(e.into(), status))?;
            body = to_ascii(&text);

            debug!(attempt, status = status.as_u16(), bytes = body.len(), "OFX response received");
            if validate(&body).is_ok() {
                break;
            }
        }

        if site.is_xml() && validate(&body).is_ok() {
            body = rewrap_as_sgml(&body);
            debug!("2.x response stored with a 1.x header");
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, site: &SiteProfile, request: &str, dest: &Path) -> QueryOutcome {
        let body = match self.exchange(site, request).await {
            Ok(body) => body,
            Err(failure) => {
                error!(url = %site.url, error = %failure.error, "An error occurred sending the OFX request");
                if let Some(status) = failure.status {
                    info!(
                        code = status.as_u16(),
                        reason = status.canonical_reason().unwrap_or(""),
                        "HTTPS response"
                    );
                }
                return QueryOutcome::failed();
            }
        };

        match write_response(dest, &body) {
            Ok(()) => QueryOutcome::written(dest),
            Err(e) => {
                error!(path = %dest.display(), error = %e, "Unable to write OFX response");
                QueryOutcome::failed()
            }
        }
    }
}

struct TransportFailure {
    error: ClientError,
    status: Option<reqwest::StatusCode>,
}

impl TransportFailure {
    fn without_response(error: ClientError) -> Self {
        Self { error, status: None }
    }

    fn with_status(error: ClientError, status: reqwest::StatusCode) -> Self {
        Self {
            error,
            status: Some(status),
        }
    }
}

fn header_value(raw: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| ClientError::Config(format!("invalid header value '{}': {}", raw, e)))
}

fn write_response(dest: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(dest, body)
}

/// ASCII가 아닌 문자를 버립니다.
pub fn to_ascii(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

/// `<?...?>` 선언을 제거하고 1.x 평문 헤더를 붙입니다.
///
/// 검증을 통과한 2.x 응답에만 적용합니다. 1.x 헤더만 읽는 소비 애플리케이션을 위해
/// 저장 파일의 틀을 맞추는 것이며, 검증기는 헤더를 보지 않으므로 판정은 바뀌지 않습니다.
/// 검증에 실패한 응답은 검토를 위해 받은 그대로 저장합니다.
pub fn rewrap_as_sgml(body: &str) -> String {
    let mut stripped = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("<?") {
        match rest[start..].find("?>") {
            Some(end) => {
                stripped.push_str(&rest[..start]);
                rest = &rest[start + end + 2..];
            }
            None => break,
        }
    }
    stripped.push_str(rest);

    format!("{}{}", sgml_header(FALLBACK_SGML_VERSION), stripped.trim_start())
}
