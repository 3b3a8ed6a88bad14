// Shared fakes for the integration tests: a scripted platform, a pacer
// that records waits instead of sleeping, and temp-dir backed sinks.

#![allow(dead_code)]

use phonecheck::config::PhoneRecord;
use phonecheck::driver::Pacer;
use phonecheck::platform::{
    Authenticator, ContactRequest, Fault, GroupRef, LoginToken, Platform, Presence, RemoteUser,
    SessionState,
};
use phonecheck::sink::Sinks;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

/// What the fake saw, shared with the test after the fake is moved.
#[derive(Debug, Default)]
pub struct CallLog {
    pub imports: Vec<String>,
    pub invites: Vec<i64>,
    pub disconnects: usize,
    pub passwords: Vec<String>,
}

#[derive(Default)]
pub struct FakePlatform {
    lookups: HashMap<String, VecDeque<Result<Vec<RemoteUser>, Fault>>>,
    invites: HashMap<i64, Result<(), Fault>>,
    group: Option<Result<GroupRef, Fault>>,
    authorized: bool,
    sign_in: Option<Fault>,
    password: Option<Fault>,
    pub log: Rc<RefCell<CallLog>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        FakePlatform {
            authorized: true,
            ..Default::default()
        }
    }

    /// Queue a lookup reply for `phone`; replies are consumed in order and
    /// an exhausted queue means "no user".
    pub fn lookup(mut self, phone: &str, reply: Result<Vec<RemoteUser>, Fault>) -> Self {
        self.lookups
            .entry(phone.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn invite(mut self, user_id: i64, reply: Result<(), Fault>) -> Self {
        self.invites.insert(user_id, reply);
        self
    }

    pub fn group(mut self, reply: Result<GroupRef, Fault>) -> Self {
        self.group = Some(reply);
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }

    pub fn sign_in_fails_with(mut self, fault: Fault) -> Self {
        self.sign_in = Some(fault);
        self
    }

    pub fn password_fails_with(mut self, fault: Fault) -> Self {
        self.password = Some(fault);
        self
    }

    pub fn log(&self) -> Rc<RefCell<CallLog>> {
        self.log.clone()
    }
}

impl Platform for FakePlatform {
    fn import_contact(&mut self, contact: &ContactRequest) -> Result<Vec<RemoteUser>, Fault> {
        self.log.borrow_mut().imports.push(contact.phone.clone());
        self.lookups
            .get_mut(&contact.phone)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(vec![]))
    }

    fn resolve_group(&mut self, _target: &str) -> Result<GroupRef, Fault> {
        self.group
            .clone()
            .unwrap_or_else(|| Err(Fault::rpc(400, "USERNAME_NOT_OCCUPIED")))
    }

    fn invite_to_group(&mut self, _group: &GroupRef, user: &RemoteUser) -> Result<(), Fault> {
        self.log.borrow_mut().invites.push(user.id);
        self.invites.get(&user.id).cloned().unwrap_or(Ok(()))
    }

    fn disconnect(&mut self) -> Result<(), Fault> {
        self.log.borrow_mut().disconnects += 1;
        Ok(())
    }
}

impl Authenticator for FakePlatform {
    fn connect(
        &mut self,
        _api_id: i32,
        _api_hash: &str,
        stored: Option<&str>,
    ) -> Result<SessionState, Fault> {
        Ok(SessionState {
            authorized: self.authorized && stored.is_some(),
            session: "fresh-token".to_string(),
        })
    }

    fn request_login_code(&mut self, phone: &str) -> Result<LoginToken, Fault> {
        Ok(LoginToken {
            phone: phone.to_string(),
            phone_code_hash: "hash".to_string(),
        })
    }

    fn sign_in(&mut self, _token: &LoginToken, _code: &str) -> Result<(), Fault> {
        match self.sign_in.clone() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn check_password(&mut self, password: &str) -> Result<(), Fault> {
        self.log.borrow_mut().passwords.push(password.to_string());
        match self.password.clone() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn session_token(&self) -> Option<String> {
        Some("fresh-token".to_string())
    }
}

/// Records every requested pause; can raise the interrupt flag after a
/// given number of pauses.
#[derive(Default)]
pub struct RecordingPacer {
    pub pauses: Rc<RefCell<Vec<Duration>>>,
    interrupt_after: Option<usize>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt_after(pauses: usize) -> Self {
        RecordingPacer {
            interrupt_after: Some(pauses),
            ..Default::default()
        }
    }
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }

    fn interrupted(&self) -> bool {
        matches!(self.interrupt_after, Some(n) if self.pauses.borrow().len() >= n)
    }
}

pub fn user(id: i64, username: Option<&str>) -> RemoteUser {
    RemoteUser {
        id,
        access_hash: id * 10,
        username: username.map(str::to_string),
        first_name: Some(format!("User{}", id)),
        last_name: None,
        presence: Presence::Online,
    }
}

pub fn records(phones: &[&str]) -> Vec<PhoneRecord> {
    phones
        .iter()
        .enumerate()
        .map(|(i, p)| PhoneRecord {
            phone: p.to_string(),
            position: i + 1,
        })
        .collect()
}

/// Temp directory holding both result tables.
pub struct Outputs {
    pub dir: TempDir,
}

impl Outputs {
    pub fn new() -> Self {
        Outputs {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn existing_path(&self) -> PathBuf {
        self.dir.path().join("existing.csv")
    }

    pub fn non_existing_path(&self) -> PathBuf {
        self.dir.path().join("non_existing.csv")
    }

    pub fn sinks(&self) -> Sinks {
        Sinks::open(&self.existing_path(), &self.non_existing_path(), false).unwrap()
    }

    /// Data rows, header dropped.
    pub fn existing_rows(&self) -> Vec<Vec<String>> {
        read_rows(&self.existing_path())
    }

    pub fn non_existing_rows(&self) -> Vec<Vec<String>> {
        read_rows(&self.non_existing_path())
    }
}

fn read_rows(path: &PathBuf) -> Vec<Vec<String>> {
    let data = std::fs::read(path).unwrap();
    let data = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(&data);
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(data)
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}
