use std::fmt;

use crate::error::{CoreError, Result};

pub const DEFAULT_DEVICE_ID: &str = "e000000000000000";

/// Credentials of an authenticated web session.
///
/// Produced once by the login handshake. Only the device id may change
/// afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// API base address, e.g. `https://wx.qq.com/cgi-bin/mmwebwx-bin`
    pub base_uri: String,
    pub skey: String,
    pub sid: String,
    pub uin: i64,
    pub pass_ticket: String,
    pub device_id: String,
}

impl SessionContext {
    pub fn new(
        base_uri: impl Into<String>,
        skey: impl Into<String>,
        sid: impl Into<String>,
        uin: i64,
        pass_ticket: impl Into<String>,
    ) -> Result<Self> {
        let base_uri = base_uri.into();
        if base_uri.is_empty() {
            return Err(CoreError::InvalidSession("empty base address".into()));
        }

        Ok(Self {
            base_uri,
            skey: skey.into(),
            sid: sid.into(),
            uin,
            pass_ticket: pass_ticket.into(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
        })
    }

    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.device_id = device_id.into();
    }

    /// Full address of an endpoint below the base address.
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_uri.trim_end_matches('/'), name)
    }
}

/// Base address derived from a login redirect: everything before the last `/`.
pub fn base_uri_from_redirect(redirect_uri: &str) -> String {
    match redirect_uri.rfind('/') {
        Some(index) => redirect_uri[..index].to_string(),
        None => redirect_uri.to_string(),
    }
}

// Credentials stay out of logs.
impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("base_uri", &self.base_uri)
            .field("uin", &self.uin)
            .field("device_id", &self.device_id)
            .field("skey", &"<redacted>")
            .field("sid", &"<redacted>")
            .field("pass_ticket", &"<redacted>")
            .finish()
    }
}
