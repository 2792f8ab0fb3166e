//! 명세서 수집 통합 테스트
//!
//! mockito 서버를 OFX 서버로 사용해 전송, 검증, 스크럽 전체 흐름을 확인합니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mockito::Matcher;
use ofx_client::{
    parse_request, run_accounts, BatchOptions, HttpTransport, QueryOutcome, StatementFetcher, Transport,
};
use ofx_core::{AccountDescriptor, Capability, MemoryClientUidStore, SiteProfile};
use ofx_scrub::Scrubber;

const INVESTMENT_NO_SECLIST: &str = "OFXHEADER:100\r\nDATA:OFXSGML\r\nVERSION:102\r\nSECURITY:NONE\r\nENCODING:USASCII\r\nCHARSET:1252\r\nCOMPRESSION:NONE\r\nOLDFILEUID:NONE\r\nNEWFILEUID:NONE\r\n\r\n<OFX>\r\n<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS><DTSERVER>20240115120000<LANGUAGE>ENG</SONRS></SIGNONMSGSRSV1>\r\n<INVSTMTMSGSRSV1>\r\n<INVSTMTTRNRS>\r\n<TRNUID>1\r\n<STATUS><CODE>0<SEVERITY>INFO</STATUS>\r\n<INVSTMTRS>\r\n<DTASOF>20240115\r\n<CURDEF>USD\r\n<INVACCTFROM><BROKERID>broker.test<ACCTID>555</INVACCTFROM>\r\n<INVTRANLIST>\r\n<DTSTART>20231215\r\n<BUYSTOCK><INVBUY><INVTRAN><FITID>T1<DTTRADE>20240102</INVTRAN><SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID><UNITS>-10<UNITPRICE>50<TOTAL>500</INVBUY><BUYTYPE>BUY</BUYSTOCK>\r\n</INVTRANLIST>\r\n<INVPOSLIST><POSSTOCK><INVPOS><SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID><HELDINACCT>CASH<POSTYPE>LONG<UNITS>10<UNITPRICE>50<MKTVAL>500<DTPRICEASOF>20240115</INVPOS></POSSTOCK></INVPOSLIST>\r\n</INVSTMTRS>\r\n</INVSTMTTRNRS>\r\n</INVSTMTMSGSRSV1>\r\n</OFX>\r\n";

const SECLIST: &str = "<SECLISTMSGSRSV1><SECLIST><STOCKINFO><SECINFO><SECID><UNIQUEID>037833100<UNIQUEIDTYPE>CUSIP</SECID><SECNAME>Apple<TICKER>AAPL</SECINFO></STOCKINFO></SECLIST></SECLISTMSGSRSV1>\r\n</OFX>";

const BANK_OK: &str = "OFXHEADER:100\r\nDATA:OFXSGML\r\n\r\n<OFX>\r\n<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS></SONRS></SIGNONMSGSRSV1>\r\n<BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKACCTFROM><BANKID>111<ACCTID>123<ACCTTYPE>CHECKING</BANKACCTFROM><BANKTRANLIST><DTSTART>20240101<DTEND>20240115</BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1>\r\n</OFX>\r\n";

const LOGIN_ERROR: &str = "<OFX><SIGNONMSGSRSV1><SONRS><STATUS><CODE>15500<SEVERITY>ERROR<MESSAGE>Bad password</STATUS></SONRS></SIGNONMSGSRSV1></OFX>";

fn investment_corrected() -> String {
    INVESTMENT_NO_SECLIST.replacen("</OFX>", SECLIST, 1)
}

fn investment_site(url: &str) -> SiteProfile {
    let mut site = SiteProfile::new(url).with_capability(Capability::Invstmt);
    site.brokerid = "broker.test".to_string();
    site.fiorg = "Broker".to_string();
    site.fid = "9000".to_string();
    site
}

fn bank_site(url: &str) -> SiteProfile {
    let mut site = SiteProfile::new(url).with_capability(Capability::Bastmt);
    site.bankid = "111".to_string();
    site
}

fn account(site: &str, number: &str) -> AccountDescriptor {
    AccountDescriptor::new(site, number, "CHECKING", "alice", "secret")
}

fn fetcher(dir: &Path) -> StatementFetcher<HttpTransport> {
    StatementFetcher::new(HttpTransport::default(), Scrubber::default(), dir)
}

#[tokio::test]
async fn test_missing_seclist_fails_and_keeps_file() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("content-type", "application/x-ofx")
        .match_header("accept", "application/x-ofx")
        .match_header("user-agent", "InetClntApp/3.0")
        .with_status(200)
        .with_body(INVESTMENT_NO_SECLIST)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = investment_site(&server.url());
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Broker", &site, &account("Broker", "555"), 30, &mut uids)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(!report.success);
    assert!(report.error.unwrap().contains("SECLIST"));
    let file = report.file.expect("file retained for review");
    assert!(file.exists());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), INVESTMENT_NO_SECLIST);
}

#[tokio::test]
async fn test_corrected_investment_succeeds_and_is_scrubbed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(investment_corrected())
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = investment_site(&server.url());
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Broker Inc.", &site, &account("Broker Inc.", "555"), 30, &mut uids)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(report.success, "{:?}", report.error);
    let file = report.file.unwrap();
    let name = file.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("BrokerInc."));
    assert!(name.ends_with(".ofx"));

    let text = std::fs::read_to_string(&file).unwrap();
    assert!(text.contains("<INVBUY><INVTRAN><FITID>T1<DTTRADE>20240102120000</INVTRAN>"));
    assert!(text.contains("<UNITS>10<UNITPRICE>50<TOTAL>-500</INVBUY>"));
    assert!(text.contains("<DTASOF>20240115120000"));
}

#[tokio::test]
async fn test_session_cookie_is_sent_on_retry() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_header("cookie", Matcher::Missing)
        .with_status(200)
        .with_header("set-cookie", "session=abc; Path=/")
        .with_body("<HTML>please retry</HTML>")
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_header("cookie", "session=abc")
        .with_status(200)
        .with_body(BANK_OK)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = bank_site(&server.url());
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Bank", &site, &account("Bank", "123:joint"), 30, &mut uids)
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert!(report.success, "{:?}", report.error);

    let text = std::fs::read_to_string(report.file.unwrap()).unwrap();
    assert!(text.contains("<ACCTID>123:joint<ACCTTYPE>"));
}

#[tokio::test]
async fn test_request_body_carries_client_uid_for_103() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<CLIENTUID>[0-9A-F-]{36}\r\n".to_string()),
            Matcher::Regex("VERSION:103\r\n".to_string()),
        ]))
        .with_body(BANK_OK)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = bank_site(&server.url()).with_version("103");
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(report.success);
}

fn xml_response(body: &str) -> String {
    let ofx = &body[body.find("<OFX>").unwrap_or(0)..];
    format!(
        "<?xml version=\"1.0\"?>\r\n<?OFX OFXHEADER=\"200\" VERSION=\"220\"?>\r\n{}",
        ofx
    )
}

#[tokio::test]
async fn test_valid_xml_response_is_stored_with_sgml_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_body(xml_response(BANK_OK))
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = bank_site(&server.url()).with_version("220");
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(report.success);
    let text = std::fs::read_to_string(report.file.unwrap()).unwrap();
    assert!(text.starts_with("OFXHEADER:100\r\nDATA:OFXSGML\r\nVERSION:102\r\n"));
    assert!(!text.contains("<?"));
    assert!(text.contains("<ACCTID>123"));
}

#[tokio::test]
async fn test_invalid_xml_response_is_kept_as_received() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_body(xml_response(LOGIN_ERROR))
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let site = bank_site(&server.url()).with_version("220");
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.error.unwrap().contains("15500"));
    let text = std::fs::read_to_string(report.file.unwrap()).unwrap();
    assert!(text.starts_with("<?xml"));
}

#[tokio::test]
async fn test_connection_refused_is_reported_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let site = bank_site("http://127.0.0.1:9");
    let mut uids = MemoryClientUidStore::new();

    let report = fetcher(dir.path())
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.file.is_none());
}

/// 호출 횟수를 세고 고정 응답을 기록하는 전송.
#[derive(Clone)]
struct CannedTransport {
    body: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for CannedTransport {
    async fn query(&self, _site: &SiteProfile, request: &str, dest: &Path) -> QueryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(parse_request(request).is_some());
        std::fs::write(dest, self.body).unwrap();
        QueryOutcome {
            success: true,
            file: Some(dest.to_path_buf()),
        }
    }
}

#[tokio::test]
async fn test_config_error_is_raised_before_network() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = CannedTransport {
        body: BANK_OK,
        calls: calls.clone(),
    };
    let dir = tempfile::tempdir().unwrap();
    let fetcher = StatementFetcher::new(transport, Scrubber::default(), dir.path());

    let site = SiteProfile::new("https://ofx.bank.test").with_capability(Capability::Bastmt);
    let mut uids = MemoryClientUidStore::new();
    let err = fetcher
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_response_file_is_validation_failure() {
    let transport = CannedTransport {
        body: "",
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let dir = tempfile::tempdir().unwrap();
    let fetcher = StatementFetcher::new(transport, Scrubber::default(), dir.path());

    let site = bank_site("https://ofx.bank.test");
    let mut uids = MemoryClientUidStore::new();
    let report = fetcher
        .fetch("Bank", &site, &account("Bank", "123"), 30, &mut uids)
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.file.unwrap().exists());
}

#[tokio::test]
async fn test_batch_skips_accounts_after_failed_logon() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = CannedTransport {
        body: LOGIN_ERROR,
        calls: calls.clone(),
    };
    let dir = tempfile::tempdir().unwrap();
    let fetcher = StatementFetcher::new(transport, Scrubber::default(), dir.path());

    let mut sites = BTreeMap::new();
    sites.insert("Bank".to_string(), bank_site("https://ofx.bank.test"));
    let accounts = vec![
        account("Bank", "1"),
        account("Bank", "2"),
        AccountDescriptor::new("Bank", "3", "SAVINGS", "bob", "pw"),
    ];
    let mut uids = MemoryClientUidStore::new();

    let summary = run_accounts(
        &fetcher,
        &sites,
        &accounts,
        BatchOptions {
            interval_days: 30,
            skip_failed_logon: true,
        },
        &mut uids,
    )
    .await;

    assert!(!summary.success);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.skipped_accounts, 1);
    assert_eq!(summary.skipped.len(), 2);
    assert!(summary.files.is_empty());
}

#[tokio::test]
async fn test_batch_collects_files_on_success() {
    let transport = CannedTransport {
        body: BANK_OK,
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let dir = tempfile::tempdir().unwrap();
    let fetcher = StatementFetcher::new(transport, Scrubber::default(), dir.path());

    let mut sites = BTreeMap::new();
    sites.insert("Bank".to_string(), bank_site("https://ofx.bank.test"));
    let accounts = vec![account("Bank", "123"), account("Bank", "")];
    let mut uids = MemoryClientUidStore::new();

    let summary = run_accounts(
        &fetcher,
        &sites,
        &accounts,
        BatchOptions {
            interval_days: 30,
            skip_failed_logon: true,
        },
        &mut uids,
    )
    .await;

    assert!(summary.success);
    assert_eq!(summary.files.len(), 2);
    assert!(summary.skipped.is_empty());
}
