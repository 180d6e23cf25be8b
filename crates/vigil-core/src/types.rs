use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{VigilError, VigilResult};

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp() as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(PolicyUuid, "Unique identifier of a policy.");
define_id!(AccountUuid, "Unique identifier of an account.");
define_id!(UserUuid, "Unique identifier of a sub-account user.");
define_id!(
    RequestTypeId,
    "Identifies the API operation a request invokes, e.g. `CreateVmMsg`."
);

// ---------------------------------------------------------------------------
// Session: the authenticated identity issuing a request
// ---------------------------------------------------------------------------

/// Which kind of principal opened the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Account,
    User,
}

impl SessionKind {
    /// Principal type string used in policy statements.
    pub fn principal_type(self) -> &'static str {
        match self {
            SessionKind::Account => "account",
            SessionKind::User => "user",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.principal_type())
    }
}

/// An authenticated session. User sessions always belong to an account.
///
/// Deserialization rejects a `user` session without a `user_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct Session {
    pub kind: SessionKind,
    pub account_uuid: AccountUuid,
    pub user_uuid: Option<UserUuid>,
}

impl Session {
    pub fn account(account_uuid: impl Into<AccountUuid>) -> Self {
        Self {
            kind: SessionKind::Account,
            account_uuid: account_uuid.into(),
            user_uuid: None,
        }
    }

    pub fn user(account_uuid: impl Into<AccountUuid>, user_uuid: impl Into<UserUuid>) -> Self {
        Self {
            kind: SessionKind::User,
            account_uuid: account_uuid.into(),
            user_uuid: Some(user_uuid.into()),
        }
    }

    pub fn is_account_session(&self) -> bool {
        self.kind == SessionKind::Account
    }

    pub fn is_user_session(&self) -> bool {
        self.kind == SessionKind::User
    }

    /// The uuid principal patterns are matched against: the account uuid for
    /// account sessions, the user uuid for user sessions. A user session
    /// built without a user uuid is an error.
    pub fn principal_uuid(&self) -> VigilResult<&str> {
        match self.kind {
            SessionKind::Account => Ok(self.account_uuid.as_str()),
            SessionKind::User => self
                .user_uuid
                .as_ref()
                .map(UserUuid::as_str)
                .ok_or_else(|| {
                    VigilError::InvalidSession(format!(
                        "user session of account '{}' has no user uuid",
                        self.account_uuid
                    ))
                }),
        }
    }
}

/// Wire form of [`Session`], checked before it becomes one.
#[derive(Deserialize)]
struct SessionRecord {
    kind: SessionKind,
    account_uuid: AccountUuid,
    #[serde(default)]
    user_uuid: Option<UserUuid>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = VigilError;

    fn try_from(record: SessionRecord) -> VigilResult<Self> {
        if record.kind == SessionKind::User && record.user_uuid.is_none() {
            return Err(VigilError::InvalidSession(format!(
                "user session of account '{}' has no user uuid",
                record.account_uuid
            )));
        }
        Ok(Self {
            kind: record.kind,
            account_uuid: record.account_uuid,
            user_uuid: record.user_uuid,
        })
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user_uuid {
            Some(user) if self.is_user_session() => {
                write!(f, "user:{} (account:{})", user, self.account_uuid)
            }
            _ => write!(f, "account:{}", self.account_uuid),
        }
    }
}
