// ABOUTME: JSON payload shapes of the web API
// ABOUTME: Request envelopes, response envelopes and decoding into ApiOutcome

use friendscan_core::{Contact, SessionContext, StatusCodes, VerifyFlag};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Session fields sent with every POST.
#[derive(Debug, Clone, Serialize)]
pub struct BaseRequest {
    #[serde(rename = "Uin")]
    pub uin: i64,
    #[serde(rename = "Sid")]
    pub sid: String,
    #[serde(rename = "Skey")]
    pub skey: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

impl From<&SessionContext> for BaseRequest {
    fn from(session: &SessionContext) -> Self {
        Self {
            uin: session.uin,
            sid: session.sid.clone(),
            skey: session.skey.clone(),
            device_id: session.device_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UserRef {
    pub user_name: String,
}

/// POST body shared by every endpoint; unused fields are omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiRequest {
    pub base_request: BaseRequest,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_list: Option<Vec<UserRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_room_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub del_member_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_member_list: Option<String>,
}

impl ApiRequest {
    pub fn new(base_request: BaseRequest) -> Self {
        Self {
            base_request,
            member_count: None,
            member_list: None,
            topic: None,
            chat_room_name: None,
            del_member_list: None,
            add_member_list: None,
        }
    }

    pub fn create_group(base_request: BaseRequest, ids: &[String]) -> Self {
        Self {
            member_count: Some(ids.len()),
            member_list: Some(
                ids.iter()
                    .map(|id| UserRef {
                        user_name: id.clone(),
                    })
                    .collect(),
            ),
            ..Self::new(base_request)
        }
    }

    pub fn add_members(base_request: BaseRequest, group_id: &str, ids: &[String]) -> Self {
        Self {
            chat_room_name: Some(group_id.to_string()),
            add_member_list: Some(ids.join(",")),
            ..Self::new(base_request)
        }
    }

    pub fn remove_members(base_request: BaseRequest, group_id: &str, ids: &[String]) -> Self {
        Self {
            chat_room_name: Some(group_id.to_string()),
            del_member_list: Some(ids.join(",")),
            ..Self::new(base_request)
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BaseResponse {
    pub ret: i64,
    #[serde(default)]
    pub err_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitPayload {
    pub user: UserRef,
}

/// Contact-list and group-chat responses share this shape.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MemberPayload {
    #[serde(default)]
    pub member_count: usize,
    #[serde(default)]
    pub chat_room_name: String,
    #[serde(default)]
    pub member_list: Vec<WireMember>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct WireMember {
    pub user_name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub remark_name: String,
    #[serde(default)]
    pub verify_flag: u32,
    #[serde(default)]
    pub member_status: i64,
}

impl WireMember {
    /// Contact-list entry: membership status is not known yet.
    pub fn into_contact(self) -> Contact {
        Contact {
            id: self.user_name,
            display_name: self.nick_name,
            remark_name: self.remark_name,
            verify_flag: VerifyFlag(self.verify_flag),
            membership_status: None,
        }
    }

    /// Group-chat echo: carries the member status.
    pub fn into_member(self, codes: &StatusCodes) -> Contact {
        let status = codes.classify(self.member_status);
        self.into_contact().with_status(status)
    }
}

/// A decoded response: the payload, or the platform's rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    Ok(T),
    ApiError { code: i64, message: String },
}

impl<T> ApiOutcome<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            ApiOutcome::Ok(payload) => Ok(payload),
            ApiOutcome::ApiError { code, message } => Err(ClientError::Api { code, message }),
        }
    }
}

/// Decode a response body and check `BaseResponse.Ret` in one step.
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<ApiOutcome<T>> {
    let mut value: serde_json::Value = serde_json::from_slice(bytes)?;

    let base = value
        .get_mut("BaseResponse")
        .map(serde_json::Value::take)
        .ok_or_else(|| ClientError::Decode("response has no BaseResponse".to_string()))?;
    let base: BaseResponse = serde_json::from_value(base)?;

    if base.ret != 0 {
        return Ok(ApiOutcome::ApiError {
            code: base.ret,
            message: base.err_msg,
        });
    }

    Ok(ApiOutcome::Ok(serde_json::from_value(value)?))
}
