// Platform seam: the calls the checker needs from the messaging platform.
// The gateway client in `api` implements these traits; tests swap in
// scripted fakes so the driver can run without a network.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One contact-import request. The platform wants a first name for every
/// imported contact, so the record's position is used as a placeholder.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContactRequest {
    pub client_id: i64,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

impl ContactRequest {
    pub fn new(phone: &str, position: usize) -> Self {
        ContactRequest {
            client_id: position as i64,
            phone: phone.to_string(),
            first_name: position.to_string(),
            last_name: String::new(),
        }
    }
}

/// Presence as reported explicitly by the platform.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Offline,
    Recently,
    LastWeek,
    LastMonth,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
            Presence::Recently => "recently",
            Presence::LastWeek => "last week",
            Presence::LastMonth => "last month",
            Presence::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A user record resolved by a contact import.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: i64,
    #[serde(default)]
    pub access_hash: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "presence_or_unknown")]
    pub presence: Presence,
}

// The gateway sends `null` for users whose status is hidden.
fn presence_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Presence, D::Error> {
    Ok(Option::<Presence>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteUser {
    /// First and last name joined, empty when the user has neither.
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{} {}", first, last).trim().to_string()
    }
}

/// A group or channel the found users are invited to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub id: i64,
    #[serde(default)]
    pub access_hash: i64,
    #[serde(default)]
    pub title: String,
}

/// Error returned by the platform for a single call, e.g. `FLOOD_WAIT_30`.
/// The trailing number, when present, is split off into `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub name: String,
    pub value: Option<u32>,
}

impl RpcError {
    pub fn parse(code: i32, message: &str) -> Self {
        if let Some((head, tail)) = message.rsplit_once('_') {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(value) = tail.parse() {
                    return RpcError {
                        code,
                        name: head.to_string(),
                        value: Some(value),
                    };
                }
            }
        }
        RpcError {
            code,
            name: message.to_string(),
            value: None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} ({}_{})", self.code, self.name, v),
            None => write!(f, "{} ({})", self.code, self.name),
        }
    }
}

/// Anything a platform call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("rpc error {0}")]
    Rpc(RpcError),
    /// The connection itself is gone; the session cannot be used further.
    #[error("transport error: {0}")]
    Transport(String),
    /// The call did not complete in time. The connection may still be usable.
    #[error("timed out: {0}")]
    Timeout(String),
    /// The reply arrived but could not be read.
    #[error("unreadable reply: {0}")]
    Decode(String),
}

impl Fault {
    pub fn rpc(code: i32, message: &str) -> Self {
        Fault::Rpc(RpcError::parse(code, message))
    }
}

/// Calls used by the batch driver once a session is open.
pub trait Platform {
    fn import_contact(&mut self, contact: &ContactRequest) -> Result<Vec<RemoteUser>, Fault>;
    fn resolve_group(&mut self, target: &str) -> Result<GroupRef, Fault>;
    fn invite_to_group(&mut self, group: &GroupRef, user: &RemoteUser) -> Result<(), Fault>;
    fn disconnect(&mut self) -> Result<(), Fault>;
}

/// Result of connecting with application credentials and a stored token.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub authorized: bool,
    pub session: String,
}

/// Handle returned by a login-code request, needed to complete sign-in.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginToken {
    pub phone: String,
    pub phone_code_hash: String,
}

/// Calls used while establishing the session.
pub trait Authenticator {
    fn connect(
        &mut self,
        api_id: i32,
        api_hash: &str,
        stored: Option<&str>,
    ) -> Result<SessionState, Fault>;
    fn request_login_code(&mut self, phone: &str) -> Result<LoginToken, Fault>;
    fn sign_in(&mut self, token: &LoginToken, code: &str) -> Result<(), Fault>;
    fn check_password(&mut self, password: &str) -> Result<(), Fault>;
    fn session_token(&self) -> Option<String>;
}
