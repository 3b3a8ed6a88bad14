// Live progress indicator for the check loop.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

// Characters of the current phone number shown next to the bar.
const PHONE_PREVIEW: usize = 10;

pub struct CheckProgress {
    bar: ProgressBar,
}

impl CheckProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} Checking [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        CheckProgress { bar }
    }

    /// A bar that draws nothing, for tests and non-terminal runs.
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
        CheckProgress { bar }
    }

    pub fn set_current(&self, phone: &str) {
        let preview: String = phone.chars().take(PHONE_PREVIEW).collect();
        self.bar.set_message(format!("current: {}...", preview));
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Print a line above the bar without tearing it.
    pub fn notice(&self, msg: &str) {
        self.bar.println(msg);
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}
