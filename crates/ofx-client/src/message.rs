//! 요청 메시지 트리와 직렬화.
//!
//! 요청은 `OFX` 봉투 아래에 로그인 섹션 하나와 거래 섹션 하나로 구성됩니다.
//! 버전 1.x는 9줄 평문 헤더 뒤에 SGML 본문(리프는 닫는 태그 없음)을,
//! 버전 2.x는 XML 선언과 `<?OFX ...?>` 처리 지시문 뒤에 XML 본문을 씁니다.
//! 모든 줄은 CRLF로 구분합니다.

use std::fmt;

use ofx_scrub::{Document, TagKind};
use uuid::Uuid;

/// 줄 구분자.
pub const CRLF: &str = "\r\n";

/// 값이 비어 있어도 항상 보내는 필드.
const ALWAYS_PRESENT: [&str; 2] = ["USERID", "USERPASS"];

/// 요청 메시지 노드.
#[derive(Clone, PartialEq, Eq)]
pub enum Node {
    /// `<TAG>value`
    Leaf { tag: String, value: String },
    /// `<TAG>` 자식들 `</TAG>`
    Aggregate { tag: String, children: Vec<Node> },
}

impl Node {
    /// 리프 노드 생성.
    pub fn leaf(tag: &str, value: impl Into<String>) -> Self {
        Node::Leaf {
            tag: tag.to_string(),
            value: value.into(),
        }
    }

    /// 집합 노드 생성.
    pub fn aggregate(tag: &str, children: Vec<Node>) -> Self {
        Node::Aggregate {
            tag: tag.to_string(),
            children,
        }
    }

    /// 태그 이름.
    pub fn tag(&self) -> &str {
        match self {
            Node::Leaf { tag, .. } | Node::Aggregate { tag, .. } => tag,
        }
    }

    /// 리프 값.
    pub fn value(&self) -> Option<&str> {
        match self {
            Node::Leaf { value, .. } => Some(value),
            Node::Aggregate { .. } => None,
        }
    }

    /// 자식 노드.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Leaf { .. } => &[],
            Node::Aggregate { children, .. } => children,
        }
    }

    /// 깊이 우선으로 태그를 찾습니다.
    pub fn find(&self, tag: &str) -> Option<&Node> {
        if self.tag() == tag {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(tag))
    }

    /// 태그의 리프 값을 찾습니다.
    pub fn find_value(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(Node::value)
    }

    fn write_lines(&self, encoding: Encoding, lines: &mut Vec<String>) {
        match self {
            Node::Leaf { tag, value } => match encoding {
                Encoding::Sgml => lines.push(format!("<{}>{}", tag, value)),
                Encoding::Xml => lines.push(format!("<{}>{}</{}>", tag, value, tag)),
            },
            Node::Aggregate { tag, children } => {
                lines.push(format!("<{}>", tag));
                for child in children {
                    child.write_lines(encoding, lines);
                }
                lines.push(format!("</{}>", tag));
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf { tag, .. } if tag == "USERPASS" => write!(f, "<{}>***", tag),
            Node::Leaf { tag, value } => write!(f, "<{}>{}", tag, value),
            Node::Aggregate { tag, children } => {
                f.debug_struct(tag).field("children", children).finish()
            }
        }
    }
}

/// 집합 노드의 자식 목록 빌더. 빈 값의 리프는 생략합니다.
#[derive(Default)]
struct Fields(Vec<Node>);

impl Fields {
    fn field(mut self, tag: &str, value: &str) -> Self {
        if !value.is_empty() || ALWAYS_PRESENT.contains(&tag) {
            self.0.push(Node::leaf(tag, value));
        }
        self
    }

    fn node(mut self, node: Node) -> Self {
        self.0.push(node);
        self
    }

    fn build(self, tag: &str) -> Node {
        Node::aggregate(tag, self.0)
    }
}

/// 본문 인코딩.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// 1.x SGML
    Sgml,
    /// 2.x XML
    Xml,
}

impl Encoding {
    /// 버전 문자열의 주 버전으로 인코딩을 결정합니다.
    pub fn for_version(ofxver: &str) -> Self {
        if ofxver.trim_start().starts_with('2') {
            Encoding::Xml
        } else {
            Encoding::Sgml
        }
    }
}

/// 1.x 평문 헤더 (빈 줄 앞까지, 마지막 CRLF 포함).
pub fn sgml_header(version: &str) -> String {
    let lines = [
        "OFXHEADER:100".to_string(),
        "DATA:OFXSGML".to_string(),
        format!("VERSION:{}", version),
        "SECURITY:NONE".to_string(),
        "ENCODING:USASCII".to_string(),
        "CHARSET:1252".to_string(),
        "COMPRESSION:NONE".to_string(),
        "OLDFILEUID:NONE".to_string(),
        "NEWFILEUID:NONE".to_string(),
        String::new(),
    ];
    lines.join(CRLF)
}

/// 2.x XML 헤더.
pub fn xml_header(version: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\" ?>{}<?OFX OFXHEADER=\"200\" VERSION=\"{}\" SECURITY=\"NONE\" OLDFILEUID=\"NONE\" NEWFILEUID=\"NONE\"?>",
        CRLF, version
    )
}

/// 로그인 정보.
#[derive(Clone)]
pub struct SignOn {
    /// 클라이언트 시각 (`YYYYMMDDHHMMSS`)
    pub dtclient: String,
    /// 사용자 ID
    pub userid: String,
    /// 비밀번호 (평문, 요청 본문에만 사용)
    pub userpass: String,
    /// FI 조직명
    pub fiorg: String,
    /// FI ID
    pub fid: String,
    /// 애플리케이션 ID
    pub appid: String,
    /// 애플리케이션 버전
    pub appver: String,
    /// 클라이언트 UID (103 이상)
    pub clientuid: Option<String>,
}

impl fmt::Debug for SignOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignOn")
            .field("dtclient", &self.dtclient)
            .field("userid", &self.userid)
            .field("userpass", &"***")
            .field("fiorg", &self.fiorg)
            .field("fid", &self.fid)
            .field("clientuid", &self.clientuid)
            .finish()
    }
}

impl SignOn {
    fn to_node(&self) -> Node {
        let fi = Fields::default()
            .field("ORG", &self.fiorg)
            .field("FID", &self.fid)
            .build("FI");

        let sonrq = Fields::default()
            .field("DTCLIENT", &self.dtclient)
            .field("USERID", &self.userid)
            .field("USERPASS", &self.userpass)
            .field("LANGUAGE", "ENG")
            .node(fi)
            .field("APPID", &self.appid)
            .field("APPVER", &self.appver)
            .field("CLIENTUID", self.clientuid.as_deref().unwrap_or(""))
            .build("SONRQ");

        Node::aggregate("SIGNONMSGSRQV1", vec![sonrq])
    }
}

/// 거래 섹션 종류.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementRequest {
    /// 계좌 목록 조회
    AccountInfo { dtacctup: String },
    /// 은행 명세서
    Bank {
        bankid: String,
        acctid: String,
        accttype: String,
        dtstart: String,
    },
    /// 카드 명세서
    CreditCard { acctid: String, dtstart: String },
    /// 투자 명세서
    Investment {
        brokerid: String,
        acctid: String,
        dtstart: String,
        dtasof: String,
    },
}

fn inctran(dtstart: &str) -> Node {
    Fields::default()
        .field("DTSTART", dtstart)
        .field("INCLUDE", "Y")
        .build("INCTRAN")
}

impl StatementRequest {
    fn to_node(&self, trnuid: &str) -> Node {
        let (msgset, trn, request) = match self {
            StatementRequest::AccountInfo { dtacctup } => (
                "SIGNUPMSGSRQV1",
                "ACCTINFOTRNRQ",
                Fields::default().field("DTACCTUP", dtacctup).build("ACCTINFORQ"),
            ),
            StatementRequest::Bank {
                bankid,
                acctid,
                accttype,
                dtstart,
            } => {
                let from = Fields::default()
                    .field("BANKID", bankid)
                    .field("ACCTID", acctid)
                    .field("ACCTTYPE", accttype)
                    .build("BANKACCTFROM");
                (
                    "BANKMSGSRQV1",
                    "STMTTRNRQ",
                    Fields::default().node(from).node(inctran(dtstart)).build("STMTRQ"),
                )
            }
            StatementRequest::CreditCard { acctid, dtstart } => {
                let from = Fields::default().field("ACCTID", acctid).build("CCACCTFROM");
                (
                    "CREDITCARDMSGSRQV1",
                    "CCSTMTTRNRQ",
                    Fields::default().node(from).node(inctran(dtstart)).build("CCSTMTRQ"),
                )
            }
            StatementRequest::Investment {
                brokerid,
                acctid,
                dtstart,
                dtasof,
            } => {
                let from = Fields::default()
                    .field("BROKERID", brokerid)
                    .field("ACCTID", acctid)
                    .build("INVACCTFROM");
                let incpos = Fields::default()
                    .field("DTASOF", dtasof)
                    .field("INCLUDE", "Y")
                    .build("INCPOS");
                (
                    "INVSTMTMSGSRQV1",
                    "INVSTMTTRNRQ",
                    Fields::default()
                        .node(from)
                        .node(inctran(dtstart))
                        .field("INCOO", "Y")
                        .node(incpos)
                        .field("INCBAL", "Y")
                        .build("INVSTMTRQ"),
                )
            }
        };

        let trnrq = Fields::default()
            .field("TRNUID", trnuid)
            .node(request)
            .build(trn);
        Node::aggregate(msgset, vec![trnrq])
    }
}

/// 직렬화 가능한 요청 메시지.
#[derive(Debug, Clone)]
pub struct OfxRequest {
    version: String,
    root: Node,
}

impl OfxRequest {
    /// 새 거래 ID로 요청을 만듭니다.
    pub fn new(version: &str, signon: &SignOn, request: &StatementRequest) -> Self {
        let trnuid = Uuid::new_v4().to_string();
        Self::with_trnuid(version, signon, request, &trnuid)
    }

    /// 거래 ID를 지정해 요청을 만듭니다.
    pub fn with_trnuid(
        version: &str,
        signon: &SignOn,
        request: &StatementRequest,
        trnuid: &str,
    ) -> Self {
        let root = Node::aggregate("OFX", vec![signon.to_node(), request.to_node(trnuid)]);
        Self {
            version: version.to_string(),
            root,
        }
    }

    /// 프로토콜 버전.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// 본문 인코딩.
    pub fn encoding(&self) -> Encoding {
        Encoding::for_version(&self.version)
    }

    /// `OFX` 루트 노드.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// 로그인 섹션.
    pub fn signon(&self) -> Option<&Node> {
        self.root.children().first()
    }

    /// 거래 섹션.
    pub fn transaction(&self) -> Option<&Node> {
        self.root.children().get(1)
    }

    /// 거래 ID.
    pub fn trnuid(&self) -> Option<&str> {
        self.transaction().and_then(|t| t.find_value("TRNUID"))
    }

    /// 헤더.
    pub fn header(&self) -> String {
        match self.encoding() {
            Encoding::Sgml => sgml_header(&self.version),
            Encoding::Xml => xml_header(&self.version),
        }
    }

    /// 본문.
    pub fn body(&self) -> String {
        let mut lines = Vec::new();
        self.root.write_lines(self.encoding(), &mut lines);
        lines.join(CRLF)
    }

    /// 전송할 전체 텍스트.
    pub fn to_wire(&self) -> String {
        format!("{}{}{}", self.header(), CRLF, self.body())
    }
}

/// 직렬화된 요청에서 `OFX` 트리를 복원합니다.
///
/// 두 인코딩을 모두 읽습니다. 닫는 태그가 없는 요소는 리프로 취급합니다.
pub fn parse_request(text: &str) -> Option<Node> {
    let doc = Document::parse(text);
    let start = doc.opens("OFX").into_iter().next()?;
    parse_node(&doc, start).map(|(node, _)| node)
}

fn parse_node(doc: &Document, idx: usize) -> Option<(Node, usize)> {
    let tag = doc.tag(idx).filter(|t| t.kind() == TagKind::Open)?;
    let name = tag.name().to_string();

    let Some(end) = doc.block_end(idx) else {
        let value = doc.trimmed_value(idx).unwrap_or("");
        let next = doc.value_index(idx).map(|v| v + 1).unwrap_or(idx + 1);
        return Some((Node::leaf(&name, value), next));
    };

    if (idx + 1..end).all(|i| doc.text(i).is_some()) {
        let value: String = (idx + 1..end).filter_map(|i| doc.text(i)).collect();
        // 집합 노드는 여는 태그 뒤에 항상 줄을 바꾸므로, 줄바꿈만 있는 블록은 빈 집합입니다.
        if value.trim().is_empty() && value.contains('\n') {
            return Some((Node::aggregate(&name, Vec::new()), end + 1));
        }
        return Some((Node::leaf(&name, value.trim()), end + 1));
    }

    let mut children = Vec::new();
    let mut i = idx + 1;
    while i < end {
        if doc.text(i).is_some() {
            i += 1;
            continue;
        }
        let (child, next) = parse_node(doc, i)?;
        children.push(child);
        i = next;
    }
    Some((Node::aggregate(&name, children), end + 1))
}
