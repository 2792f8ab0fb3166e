//! 요청 메시지 직렬화/재해석 속성 테스트
//!
//! 모든 거래 섹션 종류에 대해 1.x(SGML)와 2.x(XML) 직렬화 결과를 다시 읽으면
//! 원래 트리와 같아야 합니다.

use ofx_client::{parse_request, Encoding, OfxRequest, SignOn, StatementRequest};
use proptest::prelude::*;

fn value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9.]{1,16}"
}

fn maybe_empty() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{0,8}"
}

fn signon() -> impl Strategy<Value = SignOn> {
    (
        "[0-9]{14}",
        maybe_empty(),
        maybe_empty(),
        maybe_empty(),
        maybe_empty(),
        prop::option::of("[0-9A-F]{8}-[0-9A-F]{4}"),
    )
        .prop_map(|(dtclient, userid, userpass, fiorg, fid, clientuid)| SignOn {
            dtclient,
            userid,
            userpass,
            fiorg,
            fid,
            appid: "QWIN".to_string(),
            appver: "2700".to_string(),
            clientuid,
        })
}

fn statement_request() -> impl Strategy<Value = StatementRequest> {
    prop_oneof![
        "[0-9]{8}".prop_map(|dtacctup| StatementRequest::AccountInfo { dtacctup }),
        (value(), value(), prop_oneof![Just("CHECKING"), Just("SAVINGS"), Just("")], "[0-9]{8}").prop_map(
            |(bankid, acctid, accttype, dtstart)| StatementRequest::Bank {
                bankid,
                acctid,
                accttype: accttype.to_string(),
                dtstart,
            }
        ),
        (value(), "[0-9]{8}").prop_map(|(acctid, dtstart)| StatementRequest::CreditCard { acctid, dtstart }),
        (value(), value(), "[0-9]{8}", "[0-9]{14}").prop_map(|(brokerid, acctid, dtstart, dtasof)| {
            StatementRequest::Investment {
                brokerid,
                acctid,
                dtstart,
                dtasof,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn prop_request_survives_wire_round_trip(
        signon in signon(),
        request in statement_request(),
        version in prop_oneof![Just("102"), Just("103"), Just("211"), Just("220")],
    ) {
        let req = OfxRequest::new(version, &signon, &request);
        let wire = req.to_wire();

        let parsed = parse_request(&wire);
        prop_assert_eq!(parsed.as_ref(), Some(req.root()));

        match req.encoding() {
            Encoding::Sgml => prop_assert!(wire.starts_with("OFXHEADER:100\r\n")),
            Encoding::Xml => prop_assert!(wire.starts_with("<?xml")),
        }
    }
}
