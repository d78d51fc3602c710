use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Kind of identity an [`Account`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Microsoft,
    Offline,
}

/// The identity the launcher plays as.
///
/// `session` holds token material for online accounts. It is owned and
/// refreshed by the backend; the coordinator never looks inside.
///
/// # Example
/// ```
/// use launcher_auth::auth::{Account, AccountKind};
///
/// let account = Account::offline("Steve");
/// assert_eq!(account.kind, AccountKind::Offline);
/// assert_eq!(account, Account::offline("Steve"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub username: String,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<serde_json::Value>,
}

impl Account {
    /// Mint an offline account with a UUID derived from the username.
    pub fn offline(username: impl Into<String>) -> Self {
        let username = username.into();
        let uuid = offline_uuid(&username);
        Self {
            kind: AccountKind::Offline,
            username,
            uuid,
            session: None,
        }
    }

    pub fn microsoft(
        username: impl Into<String>,
        uuid: impl Into<String>,
        session: serde_json::Value,
    ) -> Self {
        Self {
            kind: AccountKind::Microsoft,
            username: username.into(),
            uuid: uuid.into(),
            session: Some(session),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.kind == AccountKind::Offline
    }
}

/// Deterministic UUID (v3, OID namespace) for an offline username.
pub fn offline_uuid(username: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_OID, username.as_bytes()).to_string()
}
