// ABOUTME: Decides which contacts are worth probing
// ABOUTME: Excludes official accounts, group pseudo-contacts, the operator and platform system accounts

use crate::contact::Contact;

/// Ids of group-chat pseudo-contacts start with this prefix.
pub const GROUP_ID_PREFIX: &str = "@@";

/// Platform system accounts that never take part in a probe. Matched exactly.
pub const SYSTEM_ACCOUNTS: &[&str] = &[
    "newsapp",
    "fmessage",
    "filehelper",
    "weibo",
    "qqmail",
    "tmessage",
    "qmessage",
    "qqsync",
    "floatbottle",
    "lbsapp",
    "shakeapp",
    "medianote",
    "qqfriend",
    "readerapp",
    "blogapp",
    "facebookapp",
    "masssendapp",
    "meishiapp",
    "feedsapp",
    "voip",
    "blogappweixin",
    "weixin",
    "brandsessionholder",
    "weixinreminder",
    "wxid_novlwrv3lqwv11",
    "gh_22b87fa7cb3c",
    "officialaccounts",
    "notification_messages",
    "wxitil",
    "userexperience_alarm",
];

pub fn is_system_account(id: &str) -> bool {
    SYSTEM_ACCOUNTS.contains(&id)
}

pub fn is_group_id(id: &str) -> bool {
    id.starts_with(GROUP_ID_PREFIX)
}

/// Probe-eligibility predicate bound to the operator's own id.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    self_id: String,
}

impl EligibilityFilter {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
        }
    }

    pub fn is_eligible(&self, contact: &Contact) -> bool {
        !contact.verify_flag.is_official()
            && !is_group_id(&contact.id)
            && contact.id != self.self_id
            && !is_system_account(&contact.id)
    }

    /// Eligible contacts in their original order.
    pub fn filter(&self, contacts: &[Contact]) -> Vec<Contact> {
        contacts
            .iter()
            .filter(|contact| self.is_eligible(contact))
            .cloned()
            .collect()
    }
}
