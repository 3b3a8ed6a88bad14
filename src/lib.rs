// Library root
// -----------
// This crate exposes the checker as a library; the binary (`main.rs`) wires
// the pieces together for an interactive or batch run.
//
// Module responsibilities:
// - `platform`: the calls needed from the messaging platform, as traits.
// - `api`: blocking client for the session gateway implementing them.
// - `session`: login (with second factor) and scoped release of the session.
// - `classify`: pure mapping of responses and faults to per-record outcomes.
// - `driver`: the rate-limited loop over the phone list.
// - `sink`, `stats`, `progress`: result tables, counters and the live bar.
// - `config`, `error`, `ui`: run settings, exit codes and terminal prompts.
pub mod api;
pub mod classify;
pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod progress;
pub mod session;
pub mod sink;
pub mod stats;
pub mod ui;
