// Integration tests for the batch driver:
// - one row per record, split between the two tables
// - not-found numbers, banned and invalid numbers
// - rate-limited lookups waited out and retried for the same record
// - invite mode on and off, and the invite failure categories
// - unknown per-record errors, slow and unreadable replies do not stop the run
// - session-level faults abort the run and keep statistics
// - interruption leaves exactly the rows already processed

mod common;

use common::{records, user, FakePlatform, Outputs, RecordingPacer};
use phonecheck::driver::{resolve_group, BatchDriver};
use phonecheck::error::AppError;
use phonecheck::platform::{Fault, GroupRef};
use phonecheck::progress::CheckProgress;
use std::time::Duration;

const DELAY: Duration = Duration::from_secs(7);

fn group() -> GroupRef {
    GroupRef {
        id: 900,
        access_hash: 1,
        title: "Test group".to_string(),
    }
}

#[test]
fn found_and_missing_numbers_land_in_their_tables() {
    let mut platform = FakePlatform::new()
        .lookup("+15550000001", Ok(vec![user(1, Some("alice"))]))
        .lookup("+15550000002", Ok(vec![]));
    let out = Outputs::new();
    let input = records(&["+15550000001", "+15550000002"]);

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(2),
        DELAY,
    );
    driver.run(&input).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    let existing = out.existing_rows();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0][0], "+15550000001");
    assert_eq!(existing[0][1], "@alice");
    assert_eq!(existing[0][3], "1");
    assert_eq!(existing[0][4], "yes");
    assert_eq!(existing[0][5], "n/a");
    assert_eq!(existing[0][6], "online");

    let missing = out.non_existing_rows();
    assert_eq!(missing, vec![vec!["+15550000002", "2", "no", "not registered"]]);

    assert_eq!(stats.found, 1);
    assert_eq!(stats.not_registered, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.rows_written(), 2);
}

#[test]
fn every_record_yields_exactly_one_row() {
    let mut platform = FakePlatform::new()
        .lookup("a", Ok(vec![user(1, None)]))
        .lookup("b", Err(Fault::rpc(400, "PHONE_NUMBER_BANNED")))
        .lookup("c", Err(Fault::rpc(400, "PHONE_NUMBER_INVALID")))
        .lookup("d", Err(Fault::rpc(500, "INTERNAL_SERVER_ERROR")))
        .lookup("e", Ok(vec![]));
    let out = Outputs::new();
    let input = records(&["a", "b", "c", "d", "e"]);

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(5),
        DELAY,
    );
    driver.run(&input).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    let existing = out.existing_rows();
    let missing = out.non_existing_rows();
    assert_eq!(existing.len() + missing.len(), 5);

    assert_eq!(existing[0][1], "none");
    assert_eq!(existing[1][1], "banned");
    assert_eq!(existing[1][7], "account banned");
    assert_eq!(missing[0][3], "invalid number format");
    assert!(missing[1][3].starts_with("lookup error:"));
    assert_eq!(missing[2][3], "not registered");

    assert_eq!(stats.found, 2);
    assert_eq!(stats.banned, 1);
    assert_eq!(stats.invalid_format, 1);
    assert_eq!(stats.lookup_errors, 1);
    assert!(!stats.interrupted);
}

#[test]
fn slow_or_unreadable_replies_are_recorded_and_the_run_goes_on() {
    let mut platform = FakePlatform::new()
        .lookup("a", Err(Fault::Timeout("operation timed out".into())))
        .lookup("b", Err(Fault::Decode("invalid type: null".into())))
        .lookup("c", Ok(vec![user(3, Some("carol"))]));
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(3),
        DELAY,
    );
    driver.run(&records(&["a", "b", "c"])).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    let missing = out.non_existing_rows();
    assert_eq!(missing.len(), 2);
    assert!(missing[0][3].starts_with("lookup error: timed out"));
    assert!(missing[1][3].starts_with("lookup error: unreadable reply"));
    assert_eq!(out.existing_rows()[0][1], "@carol");
    assert_eq!(stats.lookup_errors, 2);
    assert_eq!(stats.processed, 3);
}

#[test]
fn pauses_between_records_but_not_after_the_last() {
    let mut platform = FakePlatform::new();
    let out = Outputs::new();
    let pacer = RecordingPacer::new();
    let pauses = pacer.pauses.clone();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        pacer,
        CheckProgress::hidden(3),
        DELAY,
    );
    driver.run(&records(&["1", "2", "3"])).unwrap();

    assert_eq!(*pauses.borrow(), vec![DELAY, DELAY]);
}

#[test]
fn rate_limited_lookup_waits_and_retries_same_record() {
    let mut platform = FakePlatform::new()
        .lookup("+1", Err(Fault::rpc(420, "FLOOD_WAIT_30")))
        .lookup("+1", Ok(vec![user(5, Some("bob"))]))
        .lookup("+2", Ok(vec![]));
    let log = platform.log();
    let out = Outputs::new();
    let pacer = RecordingPacer::new();
    let pauses = pacer.pauses.clone();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        pacer,
        CheckProgress::hidden(2),
        DELAY,
    );
    driver.run(&records(&["+1", "+2"])).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    assert_eq!(log.borrow().imports, vec!["+1", "+1", "+2"]);
    // The wait comes first, the retry follows without the inter-call delay.
    assert_eq!(*pauses.borrow(), vec![Duration::from_secs(30), DELAY]);
    assert_eq!(out.existing_rows().len(), 1);
    assert_eq!(out.existing_rows()[0][1], "@bob");
    assert_eq!(out.non_existing_rows().len(), 1);
    assert_eq!(stats.rate_limit_waits, 1);
    assert_eq!(stats.processed, 2);
}

#[test]
fn invite_mode_off_never_invites() {
    let mut platform = FakePlatform::new().lookup("+1", Ok(vec![user(1, Some("alice"))]));
    let log = platform.log();
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(1),
        DELAY,
    );
    driver.run(&records(&["+1"])).unwrap();
    drop(driver);

    assert!(log.borrow().invites.is_empty());
    assert_eq!(out.existing_rows()[0][5], "n/a");
}

#[test]
fn invite_outcomes_are_recorded_per_user() {
    let mut platform = FakePlatform::new()
        .lookup("+1", Ok(vec![user(1, None)]))
        .lookup("+2", Ok(vec![user(2, None)]))
        .lookup("+3", Ok(vec![user(3, None)]))
        .lookup("+4", Ok(vec![user(4, None)]))
        .lookup("+5", Ok(vec![user(5, None)]))
        .invite(2, Err(Fault::rpc(400, "USER_ALREADY_PARTICIPANT")))
        .invite(3, Err(Fault::rpc(403, "USER_PRIVACY_RESTRICTED")))
        .invite(4, Err(Fault::rpc(403, "CHAT_ADMIN_REQUIRED")))
        .invite(5, Err(Fault::rpc(420, "FLOOD_WAIT_60")));
    let log = platform.log();
    let out = Outputs::new();
    let pacer = RecordingPacer::new();
    let pauses = pacer.pauses.clone();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        pacer,
        CheckProgress::hidden(5),
        DELAY,
    )
    .with_group(Some(group()));
    driver.run(&records(&["+1", "+2", "+3", "+4", "+5"])).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    let rows = out.existing_rows();
    let flags: Vec<&str> = rows.iter().map(|r| r[5].as_str()).collect();
    assert_eq!(flags, vec!["true", "true", "false", "false", "false"]);
    assert_eq!(rows[0][7], "added to group");
    assert_eq!(rows[1][7], "already a member");
    assert_eq!(rows[4][7], "invite rate limited (60s)");

    // Invite flood waits are waited out but not retried.
    assert_eq!(log.borrow().invites, vec![1, 2, 3, 4, 5]);
    assert!(pauses.borrow().contains(&Duration::from_secs(60)));

    assert_eq!(stats.invited_ok, 2);
    assert_eq!(stats.invited_failed, 3);
    assert_eq!(stats.privacy_closed, 1);
    assert_eq!(stats.admin_missing, 1);
}

#[test]
fn banned_number_is_not_invited() {
    let mut platform =
        FakePlatform::new().lookup("+1", Err(Fault::rpc(400, "PHONE_NUMBER_BANNED")));
    let log = platform.log();
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(1),
        DELAY,
    )
    .with_group(Some(group()));
    driver.run(&records(&["+1"])).unwrap();
    drop(driver);

    assert!(log.borrow().invites.is_empty());
    assert_eq!(out.existing_rows()[0][5], "false");
}

#[test]
fn session_fault_aborts_and_keeps_partial_results() {
    let mut platform = FakePlatform::new()
        .lookup("+1", Ok(vec![]))
        .lookup("+2", Err(Fault::Transport("connection reset".into())))
        .lookup("+3", Ok(vec![]));
    let log = platform.log();
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(3),
        DELAY,
    );
    let err = driver.run(&records(&["+1", "+2", "+3"])).unwrap_err();
    let stats = driver.stats().clone();
    drop(driver);

    assert!(matches!(err, AppError::Session(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.total, 3);
    assert_eq!(log.borrow().imports, vec!["+1", "+2"]);
    assert_eq!(out.non_existing_rows().len(), 1);
    assert!(out.existing_rows().is_empty());
}

#[test]
fn interruption_keeps_exactly_the_processed_rows() {
    let mut platform = FakePlatform::new()
        .lookup("+1", Ok(vec![user(1, None)]))
        .lookup("+2", Ok(vec![]));
    let log = platform.log();
    let out = Outputs::new();

    // Interrupted during the pause after the second record.
    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::interrupt_after(2),
        CheckProgress::hidden(4),
        DELAY,
    );
    driver.run(&records(&["+1", "+2", "+3", "+4"])).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    assert!(stats.interrupted);
    assert_eq!(stats.processed, 2);
    assert_eq!(log.borrow().imports.len(), 2);
    assert_eq!(out.existing_rows().len() + out.non_existing_rows().len(), 2);
}

#[test]
fn interruption_during_rate_limit_wait_writes_nothing_for_that_record() {
    let mut platform = FakePlatform::new().lookup("+1", Err(Fault::rpc(420, "FLOOD_WAIT_300")));
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::interrupt_after(1),
        CheckProgress::hidden(1),
        DELAY,
    );
    driver.run(&records(&["+1"])).unwrap();
    let stats = driver.stats().clone();
    drop(driver);

    assert!(stats.interrupted);
    assert_eq!(stats.processed, 0);
    assert!(out.existing_rows().is_empty());
    assert!(out.non_existing_rows().is_empty());
}

#[test]
fn duplicate_numbers_are_checked_independently() {
    let mut platform = FakePlatform::new()
        .lookup("+1", Ok(vec![]))
        .lookup("+1", Ok(vec![user(9, Some("late"))]));
    let out = Outputs::new();

    let mut driver = BatchDriver::new(
        &mut platform,
        out.sinks(),
        RecordingPacer::new(),
        CheckProgress::hidden(2),
        DELAY,
    );
    driver.run(&records(&["+1", "+1"])).unwrap();
    drop(driver);

    assert_eq!(out.non_existing_rows().len(), 1);
    assert_eq!(out.existing_rows().len(), 1);
    assert_eq!(out.existing_rows()[0][3], "2");
}

#[test]
fn unresolvable_group_turns_invite_mode_off() {
    let mut platform = FakePlatform::new();
    assert_eq!(resolve_group(&mut platform, "@nowhere").unwrap(), None);

    let mut platform = FakePlatform::new().group(Ok(group()));
    assert_eq!(resolve_group(&mut platform, "@here").unwrap(), Some(group()));

    let mut platform = FakePlatform::new().group(Err(Fault::Transport("offline".into())));
    assert!(matches!(
        resolve_group(&mut platform, "@here"),
        Err(AppError::Session(_))
    ));
}
