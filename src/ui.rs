// UI layer: the interactive prompts (credentials, invite target, login)
// built on `dialoguer`, and the end-of-run summary.

use crate::config::{Credentials, RunConfig};
use crate::session::Prompter;
use crate::stats::RunStatistics;
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password};
use std::path::Path;

/// Ask for the application id and secret on first run.
pub fn prompt_credentials() -> Result<Credentials> {
    println!("{}", "API configuration not found.".yellow());
    let api_id: i32 = Input::new()
        .with_prompt("API_ID")
        .interact_text()
        .context("Reading API_ID")?;
    let api_hash: String = Input::new()
        .with_prompt("API_HASH")
        .interact_text()
        .context("Reading API_HASH")?;
    Ok(Credentials {
        api_id,
        api_hash: api_hash.trim().to_string(),
    })
}

/// Ask whether found users should be invited, and where to.
pub fn ask_invite_target() -> Result<Option<String>> {
    let invite = Confirm::new()
        .with_prompt("Invite found users to a group?")
        .default(false)
        .interact()?;
    if !invite {
        return Ok(None);
    }
    println!("Note: your account must be an administrator of that group.");
    let link: String = Input::new()
        .with_prompt("Group link or @name")
        .interact_text()?;
    Ok(Some(link.trim().to_string()))
}

/// Login prompts backed by the terminal.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn phone(&mut self) -> Result<String> {
        let phone: String = Input::new()
            .with_prompt("Your account phone number")
            .interact_text()?;
        Ok(phone)
    }

    fn login_code(&mut self) -> Result<String> {
        let code: String = Input::new()
            .with_prompt("Login code")
            .interact_text()?;
        Ok(code)
    }

    fn second_factor(&mut self) -> Result<String> {
        println!("{}", "Two-factor authentication is enabled.".yellow());
        // `Password` hides input in terminal for passwords.
        let password = Password::new()
            .with_prompt("Cloud password")
            .interact()?;
        Ok(password)
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn warn(msg: &str) {
    println!("{}", msg.yellow());
}

pub fn error(msg: &str) {
    eprintln!("{}", msg.red().bold());
}

/// Render the summary report. Invite lines appear only when something was
/// invited; failure details only when they are non-zero.
pub fn render_summary(stats: &RunStatistics, invite_mode: bool) -> Vec<String> {
    let rule = "=".repeat(40);
    let thin = "-".repeat(40);
    let mut lines = vec![
        rule.clone(),
        "          RESULTS SUMMARY".to_string(),
        rule.clone(),
        format!("Numbers in list:         {}", stats.total),
        format!("Checked:                 {}", stats.processed),
        format!("Rows written:            {}", stats.rows_written()),
        thin,
        format!("Registered (found):      {}", stats.found),
    ];
    if stats.banned > 0 {
        lines.push(format!("   banned:               {}", stats.banned));
    }
    if invite_mode {
        lines.push(format!("Invited:                 {}", stats.invited_ok));
        if stats.invited_failed > 0 {
            lines.push(format!("Not invited (errors):    {}", stats.invited_failed));
            if stats.privacy_closed > 0 {
                lines.push(format!("   privacy restricted:   {}", stats.privacy_closed));
            }
            if stats.admin_missing > 0 {
                lines.push(format!("   no admin rights:      {}", stats.admin_missing));
            }
        }
    }
    lines.push(format!("Not registered:          {}", stats.not_registered));
    if stats.invalid_format > 0 {
        lines.push(format!("Invalid format:          {}", stats.invalid_format));
    }
    if stats.lookup_errors > 0 {
        lines.push(format!("Lookup errors:           {}", stats.lookup_errors));
    }
    if stats.rate_limit_waits > 0 {
        lines.push(format!("Rate-limit waits:        {}", stats.rate_limit_waits));
    }
    if stats.interrupted {
        lines.push("Run interrupted before the end of the list.".to_string());
    }
    lines.push(rule);
    lines
}

pub fn print_summary(stats: &RunStatistics, config: &RunConfig, invite_mode: bool) {
    println!();
    for line in render_summary(stats, invite_mode) {
        println!("{}", line);
    }
    println!("Found:     {}", absolute(&config.existing_output));
    println!("Not found: {}", absolute(&config.non_existing_output));
    println!("{}\n", "=".repeat(40));
}

fn absolute(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
