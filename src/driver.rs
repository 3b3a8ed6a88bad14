// Batch driver: walks the phone list in order, checks each number, writes
// one row per record and pauses between calls. Rate-limited lookups are
// waited out and re-submitted for the same record; everything else that
// goes wrong with a single record is written to a sink and the loop moves
// on. Only a fault that kills the session ends the run early.

use crate::classify::{classify_invite, classify_lookup, FoundUser, InviteOutcome, LookupOutcome};
use crate::config::PhoneRecord;
use crate::error::AppError;
use crate::platform::{ContactRequest, Fault, GroupRef, Platform};
use crate::progress::CheckProgress;
use crate::sink::{ExistingRow, InviteFlag, NonExistingRow, Sinks};
use crate::stats::RunStatistics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the waits between calls, and of the operator's interrupt.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
    fn interrupted(&self) -> bool;
}

/// Real-time pacer. Sleeps in short slices so Ctrl+C cuts a long
/// rate-limit wait short.
pub struct ThreadPacer {
    interrupted: Arc<AtomicBool>,
}

const SLEEP_SLICE: Duration = Duration::from_millis(100);

impl ThreadPacer {
    pub fn new() -> Self {
        ThreadPacer {
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pacer whose interrupt flag is raised by Ctrl+C.
    pub fn with_ctrlc() -> Self {
        let pacer = Self::new();
        let flag = pacer.interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        }) {
            tracing::warn!(error = %e, "could not install Ctrl+C handler");
        }
        pacer
    }
}

impl Default for ThreadPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.interrupted() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

enum Step {
    Recorded,
    Interrupted,
}

/// A lookup outcome that produces a row.
#[derive(Debug)]
enum Settled {
    Found(FoundUser),
    Banned,
    NotFound,
    InvalidFormat,
    Error(String),
}

impl Settled {
    /// Split off the rate-limit case, which produces no row.
    fn from_outcome(outcome: LookupOutcome) -> Result<Settled, Duration> {
        Ok(match outcome {
            LookupOutcome::Found(found) => Settled::Found(found),
            LookupOutcome::Banned => Settled::Banned,
            LookupOutcome::NotFound => Settled::NotFound,
            LookupOutcome::InvalidFormat => Settled::InvalidFormat,
            LookupOutcome::UnknownError(msg) => Settled::Error(msg),
            LookupOutcome::RateLimited(wait) => return Err(wait),
        })
    }
}

pub struct BatchDriver<'a, P: Platform, Z: Pacer> {
    platform: &'a mut P,
    pacer: Z,
    sinks: Sinks,
    progress: CheckProgress,
    delay: Duration,
    group: Option<GroupRef>,
    stats: RunStatistics,
}

impl<'a, P: Platform, Z: Pacer> BatchDriver<'a, P, Z> {
    pub fn new(
        platform: &'a mut P,
        sinks: Sinks,
        pacer: Z,
        progress: CheckProgress,
        delay: Duration,
    ) -> Self {
        BatchDriver {
            platform,
            pacer,
            sinks,
            progress,
            delay,
            group: None,
            stats: RunStatistics::default(),
        }
    }

    /// Invite every found user to `group`.
    pub fn with_group(mut self, group: Option<GroupRef>) -> Self {
        self.group = group;
        self
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Check every record in order. Statistics gathered so far stay
    /// readable through `stats()` whatever this returns.
    pub fn run(&mut self, records: &[PhoneRecord]) -> Result<(), AppError> {
        self.stats = RunStatistics::new(records.len());
        let result = self.run_records(records);
        self.progress.finish_and_clear();
        if let Err(e) = &result {
            tracing::error!(error = %e, processed = self.stats.processed, "run aborted");
        }
        result
    }

    fn run_records(&mut self, records: &[PhoneRecord]) -> Result<(), AppError> {
        for (i, record) in records.iter().enumerate() {
            if self.pacer.interrupted() {
                self.stats.interrupted = true;
                break;
            }
            self.progress.set_current(&record.phone);
            if let Step::Interrupted = self.check(record)? {
                self.stats.interrupted = true;
                break;
            }
            self.stats.processed += 1;
            self.progress.inc();

            if i + 1 < records.len() {
                self.pacer.pause(self.delay);
            }
        }
        Ok(())
    }

    fn check(&mut self, record: &PhoneRecord) -> Result<Step, AppError> {
        let request = ContactRequest::new(&record.phone, record.position);
        let outcome = loop {
            let response = self.platform.import_contact(&request);
            let outcome = classify_lookup(response).map_err(|f| AppError::Session(f.0))?;
            match Settled::from_outcome(outcome) {
                Ok(settled) => break settled,
                Err(wait) => {
                    self.stats.rate_limit_waits += 1;
                    tracing::info!(phone = %record.phone, wait_secs = wait.as_secs(), "lookup rate limited");
                    self.progress
                        .notice(&format!("Rate limited. Waiting {} s...", wait.as_secs()));
                    self.pacer.pause(wait);
                    if self.pacer.interrupted() {
                        return Ok(Step::Interrupted);
                    }
                }
            }
        };
        tracing::debug!(phone = %record.phone, position = record.position, ?outcome, "lookup classified");

        match outcome {
            Settled::Found(found) => {
                let row = self.found_row(record, &found)?;
                self.sinks.write_existing(&row)?;
                self.stats.found += 1;
            }
            Settled::Banned => {
                self.stats.found += 1;
                self.stats.banned += 1;
                let invited = if self.group.is_some() {
                    InviteFlag::No
                } else {
                    InviteFlag::NotApplicable
                };
                self.sinks.write_existing(&ExistingRow {
                    phone: record.phone.clone(),
                    username: "banned".to_string(),
                    display_name: String::new(),
                    position: record.position,
                    invited,
                    presence: "unknown".to_string(),
                    status: "account banned".to_string(),
                })?;
            }
            Settled::NotFound => {
                self.stats.not_registered += 1;
                self.write_missing(record, "not registered".to_string())?;
            }
            Settled::InvalidFormat => {
                self.stats.invalid_format += 1;
                self.write_missing(record, "invalid number format".to_string())?;
            }
            Settled::Error(msg) => {
                self.stats.lookup_errors += 1;
                self.write_missing(record, format!("lookup error: {}", msg))?;
            }
        }
        Ok(Step::Recorded)
    }

    fn found_row(&mut self, record: &PhoneRecord, found: &FoundUser) -> Result<ExistingRow, AppError> {
        let (invited, status) = match self.group.clone() {
            None => (
                InviteFlag::NotApplicable,
                "found (invite not attempted)".to_string(),
            ),
            Some(group) => {
                let outcome = self.invite(&group, found)?;
                let flag = if outcome.is_success() {
                    InviteFlag::Yes
                } else {
                    InviteFlag::No
                };
                (flag, invite_status(&outcome))
            }
        };
        Ok(ExistingRow {
            phone: record.phone.clone(),
            username: found.handle(),
            display_name: found.display_name.clone(),
            position: record.position,
            invited,
            presence: found.presence.to_string(),
            status,
        })
    }

    fn invite(&mut self, group: &GroupRef, found: &FoundUser) -> Result<InviteOutcome, AppError> {
        let response = self.platform.invite_to_group(group, &found.user);
        let outcome = classify_invite(response).map_err(|f| AppError::Session(f.0))?;
        tracing::debug!(user_id = found.user.id, ?outcome, "invite classified");

        match &outcome {
            InviteOutcome::AdminRequired if self.stats.admin_missing == 0 => {
                self.progress
                    .notice("Warning: this account has no rights to add members to the target group!");
            }
            // Counted as a failed invite; the invite itself is not retried.
            InviteOutcome::RateLimited(wait) => {
                self.stats.rate_limit_waits += 1;
                self.progress
                    .notice(&format!("Invite limit reached. Waiting {} s...", wait.as_secs()));
                self.pacer.pause(*wait);
            }
            _ => {}
        }
        self.stats.record_invite(&outcome);
        Ok(outcome)
    }

    fn write_missing(&mut self, record: &PhoneRecord, status: String) -> Result<(), AppError> {
        self.sinks.write_non_existing(&NonExistingRow {
            phone: record.phone.clone(),
            position: record.position,
            status,
        })
    }
}

fn invite_status(outcome: &InviteOutcome) -> String {
    match outcome {
        InviteOutcome::Added => "added to group".to_string(),
        InviteOutcome::AlreadyMember => "already a member".to_string(),
        InviteOutcome::PrivacyRestricted => "privacy settings forbid invites".to_string(),
        InviteOutcome::AdminRequired => "no admin rights in target group".to_string(),
        InviteOutcome::RateLimited(wait) => format!("invite rate limited ({}s)", wait.as_secs()),
        InviteOutcome::UnknownError(msg) => format!("invite error: {}", msg),
    }
}

/// Resolve the invite target. A target that cannot be resolved switches
/// invite mode off for the run; only a session-level fault is an error.
pub fn resolve_group<P: Platform>(platform: &mut P, target: &str) -> Result<Option<GroupRef>, AppError> {
    match platform.resolve_group(target) {
        Ok(group) => Ok(Some(group)),
        Err(Fault::Transport(msg)) => Err(AppError::Session(msg)),
        Err(Fault::Rpc(err)) if err.code == 401 => Err(AppError::Session(err.to_string())),
        Err(fault) => {
            tracing::warn!(target_chat = target, error = %fault, "invite target not resolved");
            Ok(None)
        }
    }
}
