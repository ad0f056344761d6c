// ABOUTME: QR-code login handshake with the web platform
// ABOUTME: Fetches a login uuid, shows the QR image, polls for confirmation and redeems the session

use chrono::Utc;
use friendscan_core::{base_uri_from_redirect, SessionContext};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dump::ResponseDump;
use crate::error::{ClientError, Result};
use crate::transport::{HttpRequest, Transport};

pub const LOGIN_HOST: &str = "https://login.weixin.qq.com";
pub const APP_ID: &str = "wx782c26e4c19acffb";

/// State reported by one login status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    /// Nothing happened before the server-side poll window closed
    Waiting,
    /// The code was scanned; the operator still has to confirm on the phone
    Scanned,
    Confirmed { redirect_uri: String },
}

/// Session credentials returned by the login redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub skey: String,
    pub sid: String,
    pub uin: i64,
    pub pass_ticket: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("uin", &self.uin)
            .finish_non_exhaustive()
    }
}

/// Substring between the first `prefix` and the next `suffix` after it.
pub fn extract_between<'a>(data: &'a str, prefix: &str, suffix: &str) -> Result<&'a str> {
    let unknown_format = || {
        ClientError::Decode(format!(
            "response format is no longer understood (missing {:?}): {}",
            prefix, data
        ))
    };

    let start = data.find(prefix).ok_or_else(unknown_format)? + prefix.len();
    let len = data[start..].find(suffix).ok_or_else(unknown_format)?;
    Ok(&data[start..start + len])
}

/// `window.QRLogin.code = 200; window.QRLogin.uuid = "...";`
pub fn parse_uuid_response(body: &str) -> Result<String> {
    let code = extract_between(body, "window.QRLogin.code = ", ";")?;
    if code != "200" {
        return Err(ClientError::Login(format!(
            "unexpected status code {} while requesting a login uuid: {}",
            code, body
        )));
    }

    Ok(extract_between(body, "window.QRLogin.uuid = \"", "\";")?.to_string())
}

/// `window.code=201;` / `window.code=200; window.redirect_uri="...";`
pub fn parse_poll_response(body: &str) -> Result<LoginPoll> {
    let code = extract_between(body, "window.code=", ";")?;
    match code {
        "201" => Ok(LoginPoll::Scanned),
        "200" => {
            let redirect = extract_between(body, "window.redirect_uri=\"", "\";")?;
            Ok(LoginPoll::Confirmed {
                redirect_uri: format!("{}&fun=new", redirect),
            })
        }
        "408" => Ok(LoginPoll::Waiting),
        "0" => Err(ClientError::Login(
            "QR code expired, please run again".to_string(),
        )),
        other => Err(ClientError::Login(format!(
            "unknown login status {}, please retry",
            other
        ))),
    }
}

/// Decode the five predefined XML entities.
pub fn unescape_xml(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn xml_value(xml: &str, tag: &str) -> Result<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    Ok(unescape_xml(extract_between(xml, &open, &close)?))
}

/// `<error><ret>0</ret><message></message><skey>..</skey><wxsid>..</wxsid>
/// <wxuin>..</wxuin><pass_ticket>..</pass_ticket></error>`
pub fn parse_session_xml(xml: &str) -> Result<LoginCredentials> {
    let ret = xml_value(xml, "ret")?;
    let ret = ret.trim();
    if ret != "0" {
        let message = xml_value(xml, "message").unwrap_or_default();
        return Err(ClientError::Login(format!(
            "session redirect rejected ({}): {}",
            ret, message
        )));
    }

    let uin = xml_value(xml, "wxuin")?;
    let uin = uin
        .trim()
        .parse()
        .map_err(|_| ClientError::Decode(format!("wxuin is not a number: {}", uin)))?;

    Ok(LoginCredentials {
        skey: xml_value(xml, "skey")?,
        sid: xml_value(xml, "wxsid")?,
        uin,
        pass_ticket: xml_value(xml, "pass_ticket")?,
    })
}

/// Closes the image viewer and removes the QR image once login finishes,
/// however it finishes.
struct QrImageGuard {
    path: PathBuf,
    viewer: Option<Child>,
}

impl Drop for QrImageGuard {
    fn drop(&mut self) {
        if let Some(mut viewer) = self.viewer.take() {
            if let Err(e) = viewer.kill() {
                debug!("Image viewer already gone: {}", e);
            }
            viewer.wait().ok();
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Drives the QR-code login handshake.
pub struct QrLogin {
    transport: Arc<dyn Transport>,
    login_host: String,
    qr_path: PathBuf,
    max_polls: u32,
    open_viewer: bool,
    dump: Option<ResponseDump>,
}

impl QrLogin {
    pub fn new(transport: Arc<dyn Transport>, qr_path: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            login_host: LOGIN_HOST.to_string(),
            qr_path: qr_path.into(),
            max_polls: 120,
            open_viewer: true,
            dump: None,
        }
    }

    pub fn with_login_host(mut self, host: impl Into<String>) -> Self {
        self.login_host = host.into();
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn without_viewer(mut self) -> Self {
        self.open_viewer = false;
        self
    }

    /// Keep every handshake body: `jslogin`, `login` (one line per poll)
    /// and `webwxnewloginpage`.
    pub fn with_dump(mut self, dump: ResponseDump) -> Self {
        self.dump = Some(dump);
        self
    }

    fn timestamp() -> String {
        Utc::now().timestamp().to_string()
    }

    async fn fetch_text(&self, name: &str, request: HttpRequest) -> Result<String> {
        let response = self.transport.send(request).await?;
        let text = response.text();
        debug!(status = response.status, bytes = text.len(), "{} response", name);

        if let Some(dump) = &self.dump {
            if let Err(e) = dump.write(name, &response.body, name == "login") {
                warn!("Failed to dump {} response: {}", name, e);
            }
        }
        Ok(text)
    }

    pub async fn fetch_uuid(&self) -> Result<String> {
        let request = HttpRequest::post_form(
            format!("{}/jslogin", self.login_host),
            [
                ("appid", APP_ID.to_string()),
                ("fun", "new".to_string()),
                ("lang", "zh_CN".to_string()),
                ("_", Self::timestamp()),
            ],
        );
        parse_uuid_response(&self.fetch_text("jslogin", request).await?)
    }

    /// Download the QR image for `uuid` to the configured path.
    pub async fn fetch_qr_image(&self, uuid: &str) -> Result<()> {
        let request = HttpRequest::post_form(
            format!("{}/qrcode/{}", self.login_host, uuid),
            [("t", "webwx".to_string()), ("_", Self::timestamp())],
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() || response.body.is_empty() {
            return Err(ClientError::Login(format!(
                "could not download QR image (HTTP {})",
                response.status
            )));
        }

        std::fs::write(&self.qr_path, &response.body)?;
        Ok(())
    }

    fn show_qr_image(&self) -> Option<Child> {
        let path = self.qr_path.as_os_str();
        let spawned = if cfg!(target_os = "macos") {
            Command::new("open").arg(path).spawn()
        } else if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", "start", ""]).arg(path).spawn()
        } else {
            Command::new("xdg-open").arg(path).spawn()
        };

        match spawned {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(
                    "Could not open an image viewer ({}); open {} manually",
                    e,
                    self.qr_path.display()
                );
                None
            }
        }
    }

    pub async fn poll(&self, uuid: &str, tip: u8) -> Result<LoginPoll> {
        let request = HttpRequest::get(format!(
            "{}/cgi-bin/mmwebwx-bin/login?tip={}&uuid={}&_={}",
            self.login_host,
            tip,
            uuid,
            Self::timestamp()
        ));
        parse_poll_response(&self.fetch_text("login", request).await?)
    }

    /// Poll until the operator confirms; returns the session redirect.
    pub async fn wait_for_confirmation(&self, uuid: &str) -> Result<String> {
        let mut tip = 1;
        for _ in 0..self.max_polls {
            let state = self.poll(uuid, tip).await?;
            tip = 0;
            match state {
                LoginPoll::Scanned => info!("QR code scanned, confirm the login on your phone"),
                LoginPoll::Waiting => debug!("Still waiting for the QR code to be scanned"),
                LoginPoll::Confirmed { redirect_uri } => return Ok(redirect_uri),
            }
        }

        Err(ClientError::Login(format!(
            "no confirmation after {} polls",
            self.max_polls
        )))
    }

    /// Follow the redirect and build the session context from its XML body.
    pub async fn redeem(&self, redirect_uri: &str, device_id: &str) -> Result<SessionContext> {
        let body = self
            .fetch_text("webwxnewloginpage", HttpRequest::get(redirect_uri))
            .await?;
        let credentials = parse_session_xml(&body)?;

        let mut session = SessionContext::new(
            base_uri_from_redirect(redirect_uri),
            credentials.skey,
            credentials.sid,
            credentials.uin,
            credentials.pass_ticket,
        )?;
        session.set_device_id(device_id);
        Ok(session)
    }

    /// Full handshake: uuid, QR image, confirmation, session.
    pub async fn login(&self, device_id: &str) -> Result<SessionContext> {
        let uuid = self.fetch_uuid().await?;
        debug!("Login uuid: {}", uuid);

        self.fetch_qr_image(&uuid).await?;
        let _guard = QrImageGuard {
            path: self.qr_path.clone(),
            viewer: if self.open_viewer {
                self.show_qr_image()
            } else {
                None
            },
        };
        info!("Scan the QR code with your phone to log in");

        let redirect_uri = self.wait_for_confirmation(&uuid).await?;
        self.redeem(&redirect_uri, device_id).await
    }
}
