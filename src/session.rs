// Session handling: connect with the application credentials, log in when
// the stored token is not authorised (phone, code, then an optional second
// factor), and make sure the session is released on every exit path.

use crate::config::{Credentials, TokenStore};
use crate::error::AppError;
use crate::platform::{Authenticator, ContactRequest, Fault, GroupRef, Platform, RemoteUser};

/// Interactive input needed while logging in.
pub trait Prompter {
    fn phone(&mut self) -> anyhow::Result<String>;
    fn login_code(&mut self) -> anyhow::Result<String>;
    fn second_factor(&mut self) -> anyhow::Result<String>;
}

/// An open session. Disconnects when dropped, unless the connection was
/// already lost.
pub struct Session<C: Platform> {
    client: C,
    released: bool,
    lost: bool,
}

impl<C: Platform> Session<C> {
    fn new(client: C) -> Self {
        Session {
            client,
            released: false,
            lost: false,
        }
    }

    fn watch<T>(&mut self, result: Result<T, Fault>) -> Result<T, Fault> {
        if let Err(Fault::Transport(_)) = &result {
            self.lost = true;
        }
        result
    }

    /// Disconnect now and report the result.
    pub fn close(mut self) -> Result<(), Fault> {
        self.release()
    }

    fn release(&mut self) -> Result<(), Fault> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.lost {
            tracing::debug!("connection lost; skipping disconnect");
            return Ok(());
        }
        self.client.disconnect()
    }
}

impl<C: Platform> Drop for Session<C> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "disconnect failed");
        }
    }
}

// Lets the driver borrow the session directly as its platform.
impl<C: Platform> Platform for Session<C> {
    fn import_contact(&mut self, contact: &ContactRequest) -> Result<Vec<RemoteUser>, Fault> {
        let result = self.client.import_contact(contact);
        self.watch(result)
    }

    fn resolve_group(&mut self, target: &str) -> Result<GroupRef, Fault> {
        let result = self.client.resolve_group(target);
        self.watch(result)
    }

    fn invite_to_group(&mut self, group: &GroupRef, user: &RemoteUser) -> Result<(), Fault> {
        let result = self.client.invite_to_group(group, user);
        self.watch(result)
    }

    fn disconnect(&mut self) -> Result<(), Fault> {
        self.release()
    }
}

/// Establish an authorised session and persist its token for later runs.
pub fn open_session<C, P>(
    mut client: C,
    credentials: &Credentials,
    store: &TokenStore,
    prompter: &mut P,
) -> Result<Session<C>, AppError>
where
    C: Authenticator + Platform,
    P: Prompter + ?Sized,
{
    let stored = store.load();
    let state = client
        .connect(credentials.api_id, &credentials.api_hash, stored.as_deref())
        .map_err(auth_error)?;
    // From here on the session is live and must be released on failure.
    let mut session = Session::new(client);

    if state.authorized {
        tracing::debug!("stored session is authorised");
    } else {
        log_in(&mut session.client, prompter)?;
    }

    if let Some(token) = session.client.session_token() {
        store.save(&token)?;
    }
    Ok(session)
}

fn log_in<C, P>(client: &mut C, prompter: &mut P) -> Result<(), AppError>
where
    C: Authenticator,
    P: Prompter + ?Sized,
{
    let phone = prompter.phone().map_err(prompt_error)?;
    let token = client.request_login_code(phone.trim()).map_err(auth_error)?;
    let code = prompter.login_code().map_err(prompt_error)?;

    match client.sign_in(&token, code.trim()) {
        Ok(()) => Ok(()),
        Err(Fault::Rpc(err)) if err.is("SESSION_PASSWORD_NEEDED") => {
            tracing::info!("second factor required");
            let password = prompter.second_factor().map_err(prompt_error)?;
            client.check_password(&password).map_err(auth_error)
        }
        Err(e) => Err(auth_error(e)),
    }
}

fn auth_error(fault: Fault) -> AppError {
    match fault {
        Fault::Transport(msg) | Fault::Timeout(msg) => AppError::Session(msg),
        Fault::Decode(msg) => AppError::Authentication(msg),
        Fault::Rpc(err) => AppError::Authentication(err.to_string()),
    }
}

fn prompt_error(err: anyhow::Error) -> AppError {
    AppError::Authentication(format!("{:#}", err))
}
