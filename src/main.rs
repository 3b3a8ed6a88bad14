// Entrypoint for the checker.
// - Parses flags, sets up logging and hands off to `run`.
// - `run` returns `anyhow::Result`; typed `AppError`s inside it pick the
//   process exit code.

use anyhow::Context;
use clap::Parser;
use phonecheck::api::{ApiClient, DEFAULT_GATEWAY_URL};
use phonecheck::config::{
    self, Credentials, RunConfig, TokenStore, DEFAULT_CONFIG_FILE, DEFAULT_DELAY_SECS,
    DEFAULT_EXISTING_FILE, DEFAULT_INPUT_FILE, DEFAULT_NON_EXISTING_FILE,
};
use phonecheck::driver::{self, BatchDriver, ThreadPacer};
use phonecheck::error::AppError;
use phonecheck::progress::CheckProgress;
use phonecheck::session::open_session;
use phonecheck::sink::Sinks;
use phonecheck::ui::{self, ConsolePrompter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Check which phone numbers have an account on the platform and
/// optionally invite the ones that do to a group.
#[derive(Parser, Debug)]
#[command(name = "phonecheck", version, about, long_about = None)]
struct Args {
    /// Phone numbers, one per line
    #[arg(long, default_value = DEFAULT_INPUT_FILE)]
    input: PathBuf,

    /// Table for numbers with an account
    #[arg(long, default_value = DEFAULT_EXISTING_FILE)]
    existing: PathBuf,

    /// Table for numbers without an account
    #[arg(long, default_value = DEFAULT_NON_EXISTING_FILE)]
    non_existing: PathBuf,

    /// Credentials file (API_ID / API_HASH)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Session token file [default: ~/.phonecheck_session]
    #[arg(long)]
    session: Option<PathBuf>,

    /// Seconds to wait between lookups
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    delay: u64,

    /// Group link or @name to invite found users to
    #[arg(long, conflicts_with = "no_invite")]
    invite: Option<String>,

    /// Do not ask about inviting found users
    #[arg(long)]
    no_invite: bool,

    /// Application id; skips the credentials file
    #[arg(long, env = "TG_API_ID", requires = "api_hash")]
    api_id: Option<i32>,

    /// Application secret; skips the credentials file
    #[arg(long, env = "TG_API_HASH", requires = "api_id", hide_env_values = true)]
    api_hash: Option<String>,

    /// Session gateway base URL
    #[arg(long, env = "API_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    /// Start both result tables afresh instead of appending
    #[arg(long)]
    fresh: bool,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            input: self.input.clone(),
            existing_output: self.existing.clone(),
            non_existing_output: self.non_existing.clone(),
            session_path: self
                .session
                .clone()
                .unwrap_or_else(config::default_session_path),
            delay: Duration::from_secs(self.delay),
            invite_target: self.invite.clone(),
            fresh_outputs: self.fresh,
        }
    }

    fn credentials(&self) -> anyhow::Result<Credentials> {
        if let (Some(api_id), Some(api_hash)) = (self.api_id, &self.api_hash) {
            return Ok(Credentials {
                api_id,
                api_hash: api_hash.clone(),
            });
        }
        if let Some(creds) = Credentials::load(&self.config)? {
            return Ok(creds);
        }
        let creds = ui::prompt_credentials()?;
        creds.save(&self.config)?;
        Ok(creds)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let app_err = e.downcast_ref::<AppError>();
            match app_err {
                Some(AppError::Interrupted) => ui::warn("Stopped by operator."),
                _ => ui::error(&format!("{:#}", e)),
            }
            ExitCode::from(app_err.map_or(1, AppError::exit_code))
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut run_config = args.run_config();

    let records = config::load_records(&run_config.input)?;
    ui::info(&format!("Numbers to check: {}", records.len()));

    let credentials = args.credentials()?;
    if run_config.invite_target.is_none() && !args.no_invite {
        run_config.invite_target = ui::ask_invite_target()?;
    }

    let client = ApiClient::new(&args.gateway)?;
    ui::info("Authorising...");
    let mut session = open_session(
        client,
        &credentials,
        &TokenStore::new(&run_config.session_path),
        &mut ConsolePrompter,
    )?;

    let group = match &run_config.invite_target {
        Some(target) => {
            ui::info(&format!("Checking access to {}...", target));
            let group = driver::resolve_group(&mut session, target)?;
            match &group {
                Some(g) => ui::info(&format!("Group found: {}. Invite mode on.", g.title)),
                None => ui::warn(&format!("Could not find {}. Invite mode off.", target)),
            }
            group
        }
        None => None,
    };
    let invite_mode = group.is_some();

    let sinks = Sinks::open(
        &run_config.existing_output,
        &run_config.non_existing_output,
        run_config.fresh_outputs,
    )?;

    ui::info("Starting...\n");
    let mut driver = BatchDriver::new(
        &mut session,
        sinks,
        ThreadPacer::with_ctrlc(),
        CheckProgress::new(records.len() as u64),
        run_config.delay,
    )
    .with_group(group);
    let result = driver.run(&records);
    let stats = driver.stats().clone();
    drop(driver);

    ui::print_summary(&stats, &run_config, invite_mode);
    if let Err(e) = session.close() {
        tracing::warn!(error = %e, "disconnect failed");
    }

    result.context("Run aborted")?;
    if stats.interrupted {
        return Err(AppError::Interrupted.into());
    }
    Ok(())
}
