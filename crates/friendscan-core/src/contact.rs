use std::fmt;

/// Bit in the verify flag that marks official / subscription accounts.
pub const OFFICIAL_ACCOUNT_BIT: u32 = 1 << 3;

/// Account verification bitset as reported by the contact list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VerifyFlag(pub u32);

impl VerifyFlag {
    pub fn is_official(self) -> bool {
        self.0 & OFFICIAL_ACCOUNT_BIT != 0
    }
}

impl From<u32> for VerifyFlag {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Member state reported by a group-chat response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipStatus {
    Normal,
    /// The platform no longer considers the pair mutual contacts.
    FormerFriend,
    Other(i64),
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipStatus::Normal => write!(f, "normal"),
            MembershipStatus::FormerFriend => write!(f, "former-friend"),
            MembershipStatus::Other(code) => write!(f, "other({})", code),
        }
    }
}

/// Raw member-status codes and how they map onto [`MembershipStatus`].
///
/// The platform has reported different codes across versions, so both values
/// come from configuration rather than being fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodes {
    pub normal: i64,
    pub former_friend: i64,
}

impl Default for StatusCodes {
    fn default() -> Self {
        Self {
            normal: 0,
            former_friend: 4,
        }
    }
}

impl StatusCodes {
    pub fn classify(&self, code: i64) -> MembershipStatus {
        if code == self.former_friend {
            MembershipStatus::FormerFriend
        } else if code == self.normal {
            MembershipStatus::Normal
        } else {
            MembershipStatus::Other(code)
        }
    }
}

/// A contact from the operator's contact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Platform identifier, unique within one account's contact list
    pub id: String,
    pub display_name: String,
    pub remark_name: String,
    pub verify_flag: VerifyFlag,
    /// Only known once the contact has appeared in a group-chat response
    pub membership_status: Option<MembershipStatus>,
}

impl Contact {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            remark_name: String::new(),
            verify_flag: VerifyFlag::default(),
            membership_status: None,
        }
    }

    pub fn with_remark(mut self, remark_name: impl Into<String>) -> Self {
        self.remark_name = remark_name.into();
        self
    }

    pub fn with_verify_flag(mut self, bits: u32) -> Self {
        self.verify_flag = VerifyFlag(bits);
        self
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.membership_status = Some(status);
        self
    }

    pub fn is_former_friend(&self) -> bool {
        self.membership_status == Some(MembershipStatus::FormerFriend)
    }

    /// Human-readable `"nickname / remark"` label used in findings.
    pub fn label(&self) -> String {
        format!("{} / {}", self.display_name, self.remark_name)
    }
}
