// Classifier: turns one platform response (or fault) into exactly one
// outcome. Both functions are pure so every branch can be exercised by
// handing them fabricated faults.

use crate::platform::{Fault, Presence, RemoteUser, RpcError};
use std::time::Duration;

/// Longest error text stored in a result row.
pub const MAX_ERROR_CHARS: usize = 50;

/// A user the lookup resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundUser {
    pub user: RemoteUser,
    pub username: Option<String>,
    pub display_name: String,
    pub presence: Presence,
}

impl FoundUser {
    fn from_remote(user: RemoteUser) -> Self {
        FoundUser {
            username: user.username.clone().filter(|u| !u.is_empty()),
            display_name: user.display_name(),
            presence: user.presence,
            user,
        }
    }

    /// `@handle`, or `none` when the account has no public handle.
    pub fn handle(&self) -> String {
        match &self.username {
            Some(u) => format!("@{}", u),
            None => "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(FoundUser),
    NotFound,
    Banned,
    InvalidFormat,
    RateLimited(Duration),
    UnknownError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    Added,
    AlreadyMember,
    PrivacyRestricted,
    AdminRequired,
    RateLimited(Duration),
    UnknownError(String),
}

impl InviteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InviteOutcome::Added | InviteOutcome::AlreadyMember)
    }
}

/// A fault that ends the whole run instead of a single record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FatalFault(pub String);

pub fn classify_lookup(response: Result<Vec<RemoteUser>, Fault>) -> Result<LookupOutcome, FatalFault> {
    let err = match response {
        Ok(users) => {
            return Ok(match users.into_iter().next() {
                Some(user) => LookupOutcome::Found(FoundUser::from_remote(user)),
                None => LookupOutcome::NotFound,
            })
        }
        Err(Fault::Transport(msg)) => return Err(FatalFault(msg)),
        Err(fault @ (Fault::Timeout(_) | Fault::Decode(_))) => {
            return Ok(LookupOutcome::UnknownError(truncate(&fault.to_string())))
        }
        Err(Fault::Rpc(err)) => err,
    };

    if is_session_fatal(&err) {
        return Err(FatalFault(err.to_string()));
    }
    if let Some(wait) = flood_wait(&err) {
        return Ok(LookupOutcome::RateLimited(wait));
    }
    Ok(match err.name.as_str() {
        "PHONE_NUMBER_BANNED" => LookupOutcome::Banned,
        "PHONE_NUMBER_INVALID" => LookupOutcome::InvalidFormat,
        _ => LookupOutcome::UnknownError(truncate(&err.to_string())),
    })
}

pub fn classify_invite(response: Result<(), Fault>) -> Result<InviteOutcome, FatalFault> {
    let err = match response {
        Ok(()) => return Ok(InviteOutcome::Added),
        Err(Fault::Transport(msg)) => return Err(FatalFault(msg)),
        Err(fault @ (Fault::Timeout(_) | Fault::Decode(_))) => {
            return Ok(InviteOutcome::UnknownError(truncate(&fault.to_string())))
        }
        Err(Fault::Rpc(err)) => err,
    };

    if is_session_fatal(&err) {
        return Err(FatalFault(err.to_string()));
    }
    if let Some(wait) = flood_wait(&err) {
        return Ok(InviteOutcome::RateLimited(wait));
    }
    Ok(match err.name.as_str() {
        "USER_ALREADY_PARTICIPANT" => InviteOutcome::AlreadyMember,
        "USER_PRIVACY_RESTRICTED" => InviteOutcome::PrivacyRestricted,
        "CHAT_ADMIN_REQUIRED" => InviteOutcome::AdminRequired,
        _ => InviteOutcome::UnknownError(truncate(&err.to_string())),
    })
}

// 401 covers revoked, expired and unregistered sessions as well as
// deactivated accounts.
fn is_session_fatal(err: &RpcError) -> bool {
    err.code == 401
}

fn flood_wait(err: &RpcError) -> Option<Duration> {
    match (err.name.as_str(), err.value) {
        ("FLOOD_WAIT" | "FLOOD_PREMIUM_WAIT", Some(secs)) => Some(Duration::from_secs(secs.into())),
        _ => None,
    }
}

/// Cut `msg` to at most `MAX_ERROR_CHARS` characters.
pub fn truncate(msg: &str) -> String {
    msg.chars().take(MAX_ERROR_CHARS).collect()
}
