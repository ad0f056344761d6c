use async_trait::async_trait;
use friendscan_client::{
    ClientError, HttpRequest, HttpResponse, HttpTransport, Method, QrLogin, RequestBody,
    ResponseDump, Result, Transport, WebApi,
};
use friendscan_core::{MembershipStatus, SessionContext, TransportConfig};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Replays canned responses in order and records every request.
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.into(),
        });
    }

    fn push_json(&self, body: Value) {
        self.push(200, body.to_string());
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClientError::Transport("no scripted response left".into()))
    }
}

fn session() -> SessionContext {
    SessionContext::new(
        "https://wx.qq.com/cgi-bin/mmwebwx-bin",
        "@crypt_key",
        "sid1",
        42,
        "tkt",
    )
    .unwrap()
}

fn json_body(request: &HttpRequest) -> Value {
    match &request.body {
        Some(RequestBody::Json(bytes)) => serde_json::from_slice(bytes).unwrap(),
        other => panic!("expected a JSON body, got {:?}", other),
    }
}

fn ok() -> Value {
    json!({"Ret": 0, "ErrMsg": ""})
}

#[tokio::test]
async fn test_init_and_contact_list() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({"BaseResponse": ok(), "User": {"UserName": "@me"}}));
    transport.push_json(json!({
        "BaseResponse": ok(),
        "MemberCount": 2,
        "MemberList": [
            {"UserName": "@a", "NickName": "Alice", "RemarkName": "Al", "VerifyFlag": 0},
            {"UserName": "@news", "NickName": "News", "VerifyFlag": 8}
        ]
    }));

    let api = WebApi::new(transport.clone(), session());
    assert_eq!(api.init().await.unwrap(), "@me");

    let list = api.list_contacts().await.unwrap();
    assert_eq!(list.total, 2);
    assert_eq!(list.contacts[0].label(), "Alice / Al");
    assert!(list.contacts[1].verify_flag.is_official());
    assert!(list.contacts.iter().all(|c| c.membership_status.is_none()));

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert!(requests[0]
        .url
        .starts_with("https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxinit?pass_ticket=tkt&skey=@crypt_key&r="));
    assert_eq!(json_body(&requests[0])["BaseRequest"]["Uin"], 42);
    assert_eq!(
        json_body(&requests[0])["BaseRequest"]["DeviceID"],
        "e000000000000000"
    );

    assert_eq!(requests[1].method, Method::Get);
    assert!(requests[1].url.contains("/webwxgetcontact?pass_ticket=tkt&skey=@crypt_key&r="));
}

#[tokio::test]
async fn test_group_lifecycle_requests() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
        "BaseResponse": ok(),
        "ChatRoomName": "@@room",
        "MemberCount": 2,
        "MemberList": [
            {"UserName": "@a", "NickName": "Alice", "MemberStatus": 0},
            {"UserName": "@b", "NickName": "Bob", "MemberStatus": 4}
        ]
    }));
    transport.push_json(json!({
        "BaseResponse": ok(),
        "MemberList": [{"UserName": "@c", "NickName": "Carol", "MemberStatus": 4}]
    }));
    transport.push_json(json!({"BaseResponse": ok()}));

    let api = WebApi::new(transport.clone(), session());
    let ids = vec!["@a".to_string(), "@b".to_string()];

    let group = api.create_group(&ids).await.unwrap();
    assert_eq!(group.group_id, "@@room");
    assert_eq!(
        group.members[1].membership_status,
        Some(MembershipStatus::FormerFriend)
    );
    assert_eq!(
        group.members[0].membership_status,
        Some(MembershipStatus::Normal)
    );

    let added = api
        .add_members("@@room", &["@c".to_string()])
        .await
        .unwrap();
    assert!(added[0].is_former_friend());

    api.remove_members("@@room", &["@c".to_string()])
        .await
        .unwrap();

    let requests = transport.requests();
    assert!(requests[0].url.contains("/webwxcreatechatroom?pass_ticket=tkt&r="));
    assert_eq!(json_body(&requests[0])["MemberCount"], 2);
    assert_eq!(json_body(&requests[0])["MemberList"][1]["UserName"], "@b");

    assert!(requests[1]
        .url
        .contains("/webwxupdatechatroom?fun=addmember&pass_ticket=tkt&r="));
    assert_eq!(json_body(&requests[1])["AddMemberList"], "@c");

    assert!(requests[2]
        .url
        .contains("/webwxupdatechatroom?fun=delmember&pass_ticket=tkt&r="));
    assert_eq!(json_body(&requests[2])["DelMemberList"], "@c");
    assert_eq!(json_body(&requests[2])["ChatRoomName"], "@@room");
}

#[tokio::test]
async fn test_platform_rejection_and_http_failure() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({"BaseResponse": {"Ret": 1205, "ErrMsg": "too frequent"}}));
    transport.push(503, "busy");
    transport.push_json(json!({"BaseResponse": ok(), "MemberList": []}));

    let api = WebApi::new(transport.clone(), session());
    let ids = vec!["@a".to_string()];

    match api.create_group(&ids).await {
        Err(ClientError::Api { code, message }) => {
            assert_eq!(code, 1205);
            assert_eq!(message, "too frequent");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    assert!(matches!(
        api.add_members("@@room", &ids).await,
        Err(ClientError::Transport(_))
    ));

    // success envelope without a group id
    assert!(matches!(
        api.create_group(&ids).await,
        Err(ClientError::Decode(_))
    ));
}

#[tokio::test]
async fn test_responses_are_dumped() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let first = json!({"BaseResponse": ok(), "MemberList": [{"UserName": "@a"}]});
    let second = json!({"BaseResponse": ok(), "MemberList": [{"UserName": "@b"}]});
    transport.push_json(first.clone());
    transport.push_json(second.clone());

    let dump = ResponseDump::new(dir.path());
    let api = WebApi::new(transport, session()).with_dump(dump.clone());
    api.add_members("@@room", &["@a".to_string()]).await.unwrap();
    api.add_members("@@room", &["@b".to_string()]).await.unwrap();

    let written = std::fs::read_to_string(dump.path_for("addmember")).unwrap();
    assert_eq!(written, format!("{}\n{}\n", first, second));
}

#[tokio::test]
async fn test_qr_login_handshake() {
    let dir = tempdir().unwrap();
    let qr_path = dir.path().join("qrcode.jpg");

    let transport = ScriptedTransport::new();
    transport.push(
        200,
        "window.QRLogin.code = 200; window.QRLogin.uuid = \"uuid-1\";",
    );
    transport.push(200, vec![0xff, 0xd8, 0xff]);
    transport.push(200, "window.code=408;");
    transport.push(200, "window.code=201;");
    transport.push(
        200,
        "window.code=200;\nwindow.redirect_uri=\"https://wx2.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=T&uuid=uuid-1\";",
    );
    transport.push(
        200,
        "<error><ret>0</ret><message></message><skey>@crypt_9</skey><wxsid>sid9</wxsid><wxuin>99</wxuin><pass_ticket>pt9</pass_ticket></error>",
    );

    let login = QrLogin::new(transport.clone(), &qr_path)
        .with_login_host("https://login.test")
        .without_viewer();
    let session = login.login("e123456789012345").await.unwrap();

    assert_eq!(session.base_uri, "https://wx2.qq.com/cgi-bin/mmwebwx-bin");
    assert_eq!(session.skey, "@crypt_9");
    assert_eq!(session.sid, "sid9");
    assert_eq!(session.uin, 99);
    assert_eq!(session.pass_ticket, "pt9");
    assert_eq!(session.device_id, "e123456789012345");
    assert!(!qr_path.exists());

    let requests = transport.requests();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests[0].url, "https://login.test/jslogin");
    assert_eq!(requests[1].url, "https://login.test/qrcode/uuid-1");
    assert!(requests[2].url.contains("login?tip=1&uuid=uuid-1"));
    assert!(requests[3].url.contains("login?tip=0&uuid=uuid-1"));
    assert!(requests[5].url.ends_with("&fun=new"));
}

#[tokio::test]
async fn test_qr_login_dumps_handshake_bodies() {
    let dir = tempdir().unwrap();
    let dump = ResponseDump::new(dir.path().join("dumps"));

    let transport = ScriptedTransport::new();
    transport.push(
        200,
        "window.QRLogin.code = 200; window.QRLogin.uuid = \"uuid-2\";",
    );
    transport.push(200, vec![0xff, 0xd8]);
    transport.push(200, "window.code=201;");
    transport.push(
        200,
        "window.code=200;\nwindow.redirect_uri=\"https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=T\";",
    );
    let xml = "<error><ret>0</ret><message></message><skey>k</skey><wxsid>s</wxsid><wxuin>1</wxuin><pass_ticket>p</pass_ticket></error>";
    transport.push(200, xml);

    QrLogin::new(transport, dir.path().join("qrcode.jpg"))
        .with_login_host("https://login.test")
        .with_dump(dump.clone())
        .without_viewer()
        .login("e000000000000000")
        .await
        .unwrap();

    let read = |name: &str| std::fs::read_to_string(dump.path_for(name)).unwrap();
    assert!(read("jslogin").contains("uuid-2"));
    assert_eq!(read("login").lines().count(), 3);
    assert_eq!(read("webwxnewloginpage"), xml);
}

#[tokio::test]
async fn test_http_timeout_maps_to_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // accept and never answer
    let server = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    let config = TransportConfig {
        timeout_secs: 1,
        ..TransportConfig::default()
    };
    let transport = HttpTransport::new(&config).unwrap();
    let result = transport
        .send(HttpRequest::get(format!("http://{}/webwxinit", addr)))
        .await;

    match result {
        Err(ClientError::Transport(message)) => assert!(message.contains("timed out")),
        other => panic!("unexpected result: {:?}", other),
    }
    server.abort();
}

#[tokio::test]
async fn test_qr_login_gives_up_after_max_polls() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.push(200, "window.code=408;");
    transport.push(200, "window.code=408;");

    let login = QrLogin::new(transport.clone(), dir.path().join("qrcode.jpg"))
        .with_login_host("https://login.test")
        .with_max_polls(2)
        .without_viewer();

    assert!(matches!(
        login.wait_for_confirmation("uuid-1").await,
        Err(ClientError::Login(_))
    ));
    assert_eq!(transport.requests().len(), 2);
}
