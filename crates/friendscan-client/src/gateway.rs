use chrono::Utc;
use friendscan_core::{Contact, SessionContext, StatusCodes};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dump::ResponseDump;
use crate::error::{ClientError, Result};
use crate::transport::{HttpRequest, Transport};
use crate::wire::{decode_envelope, ApiRequest, BaseRequest, InitPayload, MemberPayload};

/// The operator's full contact list as returned by the platform.
#[derive(Debug, Clone)]
pub struct ContactList {
    pub contacts: Vec<Contact>,
    /// Count reported by the platform; may differ from `contacts.len()`
    pub total: usize,
}

/// Result of creating the probe group.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub group_id: String,
    /// Members as echoed back, each with a membership status
    pub members: Vec<Contact>,
}

/// Typed access to the handful of web endpoints the probe needs.
pub struct WebApi {
    transport: Arc<dyn Transport>,
    session: SessionContext,
    status_codes: StatusCodes,
    dump: Option<ResponseDump>,
}

impl WebApi {
    pub fn new(transport: Arc<dyn Transport>, session: SessionContext) -> Self {
        Self {
            transport,
            session,
            status_codes: StatusCodes::default(),
            dump: None,
        }
    }

    pub fn with_status_codes(mut self, status_codes: StatusCodes) -> Self {
        self.status_codes = status_codes;
        self
    }

    pub fn with_dump(mut self, dump: ResponseDump) -> Self {
        self.dump = Some(dump);
        self
    }

    /// Cache-busting value appended to query strings.
    fn timestamp() -> i64 {
        Utc::now().timestamp()
    }

    fn base_request(&self) -> BaseRequest {
        BaseRequest::from(&self.session)
    }

    /// Send, optionally dump, then decode the envelope. A nonzero `Ret`
    /// becomes [`ClientError::Api`].
    async fn call<T: DeserializeOwned>(
        &self,
        url: String,
        dump_name: &str,
        body: Option<&ApiRequest>,
    ) -> Result<T> {
        let request = match body {
            Some(body) => HttpRequest::post_json(url, serde_json::to_vec(body)?),
            None => HttpRequest::get(url),
        };

        let response = self.transport.send(request).await?;

        if let Some(dump) = &self.dump {
            let append = dump_name.ends_with("member");
            if let Err(e) = dump.write(dump_name, &response.body, append) {
                warn!("Failed to dump {} response: {}", dump_name, e);
            }
        }

        if !response.is_success() {
            return Err(ClientError::Transport(format!(
                "{} returned HTTP {}",
                dump_name, response.status
            )));
        }

        decode_envelope::<T>(&response.body)?.into_result()
    }

    /// Initialise the session; returns the operator's own contact id.
    pub async fn init(&self) -> Result<String> {
        let url = format!(
            "{}?pass_ticket={}&skey={}&r={}",
            self.session.endpoint("webwxinit"),
            self.session.pass_ticket,
            self.session.skey,
            Self::timestamp()
        );
        let body = ApiRequest::new(self.base_request());

        let payload: InitPayload = self.call(url, "webwxinit", Some(&body)).await?;
        debug!("Session initialised for {}", payload.user.user_name);
        Ok(payload.user.user_name)
    }

    pub async fn list_contacts(&self) -> Result<ContactList> {
        let url = format!(
            "{}?pass_ticket={}&skey={}&r={}",
            self.session.endpoint("webwxgetcontact"),
            self.session.pass_ticket,
            self.session.skey,
            Self::timestamp()
        );

        let payload: MemberPayload = self.call(url, "webwxgetcontact", None).await?;
        if payload.member_count != payload.member_list.len() {
            warn!(
                "Contact list reports {} members but carries {}",
                payload.member_count,
                payload.member_list.len()
            );
        }

        Ok(ContactList {
            total: payload.member_count,
            contacts: payload
                .member_list
                .into_iter()
                .map(|m| m.into_contact())
                .collect(),
        })
    }

    pub async fn create_group(&self, ids: &[String]) -> Result<GroupSnapshot> {
        let url = format!(
            "{}?pass_ticket={}&r={}",
            self.session.endpoint("webwxcreatechatroom"),
            self.session.pass_ticket,
            Self::timestamp()
        );
        let body = ApiRequest::create_group(self.base_request(), ids);

        let payload: MemberPayload = self.call(url, "webwxcreatechatroom", Some(&body)).await?;
        if payload.chat_room_name.is_empty() {
            return Err(ClientError::Decode(
                "group creation response carries no ChatRoomName".to_string(),
            ));
        }

        Ok(GroupSnapshot {
            group_id: payload.chat_room_name.clone(),
            members: self.members(payload),
        })
    }

    pub async fn add_members(&self, group_id: &str, ids: &[String]) -> Result<Vec<Contact>> {
        let url = self.update_url("addmember");
        let body = ApiRequest::add_members(self.base_request(), group_id, ids);

        let payload: MemberPayload = self.call(url, "addmember", Some(&body)).await?;
        Ok(self.members(payload))
    }

    pub async fn remove_members(&self, group_id: &str, ids: &[String]) -> Result<()> {
        let url = self.update_url("delmember");
        let body = ApiRequest::remove_members(self.base_request(), group_id, ids);

        let _: MemberPayload = self.call(url, "delmember", Some(&body)).await?;
        Ok(())
    }

    fn update_url(&self, fun: &str) -> String {
        format!(
            "{}?fun={}&pass_ticket={}&r={}",
            self.session.endpoint("webwxupdatechatroom"),
            fun,
            self.session.pass_ticket,
            Self::timestamp()
        )
    }

    fn members(&self, payload: MemberPayload) -> Vec<Contact> {
        payload
            .member_list
            .into_iter()
            .map(|m| m.into_member(&self.status_codes))
            .collect()
    }
}
