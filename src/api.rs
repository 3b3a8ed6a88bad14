// API client module: a small blocking HTTP client that talks to the session
// gateway. The gateway wraps the platform's official client library and
// exposes the handful of calls the checker needs as JSON endpoints.

use crate::platform::{
    Authenticator, ContactRequest, Fault, GroupRef, LoginToken, Platform, RemoteUser, SessionState,
};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8081";
const SESSION_HEADER: &str = "x-session";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking gateway client. Holds the reqwest client, the base URL and the
/// session token once `connect` has succeeded.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<String>,
}

#[derive(Serialize, Debug)]
struct ConnectRequest<'a> {
    api_id: i32,
    api_hash: &'a str,
    session: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct PhoneRequest<'a> {
    phone: &'a str,
}

#[derive(Serialize, Debug)]
struct SignInRequest<'a> {
    phone: &'a str,
    phone_code_hash: &'a str,
    code: &'a str,
}

#[derive(Serialize, Debug)]
struct PasswordRequest<'a> {
    password: &'a str,
}

#[derive(Serialize, Debug)]
struct ResolveRequest<'a> {
    query: &'a str,
}

#[derive(Serialize, Debug)]
struct InviteRequest<'a> {
    channel: &'a GroupRef,
    user_id: i64,
    access_hash: i64,
}

#[derive(Deserialize, Debug)]
struct ImportResponse {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

/// Error body returned with any non-2xx status.
#[derive(Deserialize, Debug)]
struct ErrorBody {
    error_code: i32,
    error_message: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct Empty {}

impl ApiClient {
    /// Create an ApiClient for the gateway at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Same as `new`, with a per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    fn session_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.session {
            if let Ok(value) = HeaderValue::from_str(token) {
                headers.insert(SESSION_HEADER, value);
            }
        }
        headers
    }

    /// POST `body` to `path` and decode the reply. Gateway errors become
    /// `Fault::Rpc`; a reply that does not decode is `Fault::Decode`, a call
    /// that runs past the client timeout `Fault::Timeout`. Only a failure to
    /// reach the gateway at all is `Fault::Transport`.
    fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, Fault>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .headers(self.session_headers())
            .json(body)
            .send()
            .map_err(|e| send_fault(path, e))?;

        let status = res.status();
        let txt = res.text().map_err(|e| send_fault(path, e))?;
        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &txt));
        }
        serde_json::from_str(&txt)
            .with_context(|| format!("Parsing {} response json", path))
            .map_err(|e| Fault::Decode(format!("{:#}", e)))
    }
}

fn send_fault(path: &str, err: reqwest::Error) -> Fault {
    let timed_out = err.is_timeout();
    let msg = format!("{:#}", anyhow::Error::new(err).context(format!("Request to {} failed", path)));
    if timed_out {
        Fault::Timeout(msg)
    } else {
        Fault::Transport(msg)
    }
}

/// Turn an error reply into a fault, falling back to the HTTP status when
/// the body is not the gateway's error shape.
fn parse_error_body(status: u16, body: &str) -> Fault {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => Fault::rpc(err.error_code, &err.error_message),
        Err(_) if status >= 500 || status == 404 => {
            Fault::Transport(format!("gateway returned {}: {}", status, body.trim()))
        }
        Err(_) => Fault::rpc(i32::from(status), body.trim()),
    }
}

impl Authenticator for ApiClient {
    fn connect(
        &mut self,
        api_id: i32,
        api_hash: &str,
        stored: Option<&str>,
    ) -> std::result::Result<SessionState, Fault> {
        let req = ConnectRequest {
            api_id,
            api_hash,
            session: stored,
        };
        let state: SessionState = self.post("/session", &req)?;
        self.session = Some(state.session.clone());
        Ok(state)
    }

    fn request_login_code(&mut self, phone: &str) -> std::result::Result<LoginToken, Fault> {
        self.post("/auth/code", &PhoneRequest { phone })
    }

    fn sign_in(&mut self, token: &LoginToken, code: &str) -> std::result::Result<(), Fault> {
        let req = SignInRequest {
            phone: &token.phone,
            phone_code_hash: &token.phone_code_hash,
            code,
        };
        self.post::<_, Empty>("/auth/sign-in", &req).map(|_| ())
    }

    fn check_password(&mut self, password: &str) -> std::result::Result<(), Fault> {
        self.post::<_, Empty>("/auth/password", &PasswordRequest { password })
            .map(|_| ())
    }

    fn session_token(&self) -> Option<String> {
        self.session.clone()
    }
}

impl Platform for ApiClient {
    fn import_contact(&mut self, contact: &ContactRequest) -> std::result::Result<Vec<RemoteUser>, Fault> {
        let resp: ImportResponse = self.post("/contacts/import", contact)?;
        Ok(resp.users)
    }

    fn resolve_group(&mut self, target: &str) -> std::result::Result<GroupRef, Fault> {
        self.post("/entities/resolve", &ResolveRequest { query: target })
    }

    fn invite_to_group(&mut self, group: &GroupRef, user: &RemoteUser) -> std::result::Result<(), Fault> {
        let req = InviteRequest {
            channel: group,
            user_id: user.id,
            access_hash: user.access_hash,
        };
        self.post::<_, Empty>("/channels/invite", &req).map(|_| ())
    }

    fn disconnect(&mut self) -> std::result::Result<(), Fault> {
        if self.session.is_none() {
            return Ok(());
        }
        let result = self.post::<_, Empty>("/session/disconnect", &Empty {}).map(|_| ());
        self.session = None;
        result
    }
}
