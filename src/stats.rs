// Run statistics, owned by the driver and printed once at the end.

use crate::classify::InviteOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Records in the input list.
    pub total: usize,
    /// Records that produced a row.
    pub processed: usize,
    /// Registered accounts, banned ones included.
    pub found: usize,
    pub banned: usize,
    pub invited_ok: usize,
    pub invited_failed: usize,
    pub privacy_closed: usize,
    pub admin_missing: usize,
    pub not_registered: usize,
    pub invalid_format: usize,
    pub lookup_errors: usize,
    pub rate_limit_waits: usize,
    pub interrupted: bool,
}

impl RunStatistics {
    pub fn new(total: usize) -> Self {
        RunStatistics {
            total,
            ..Default::default()
        }
    }

    pub fn record_invite(&mut self, outcome: &InviteOutcome) {
        if outcome.is_success() {
            self.invited_ok += 1;
            return;
        }
        self.invited_failed += 1;
        match outcome {
            InviteOutcome::PrivacyRestricted => self.privacy_closed += 1,
            InviteOutcome::AdminRequired => self.admin_missing += 1,
            _ => {}
        }
    }

    /// Every processed record lands in exactly one of these buckets.
    pub fn rows_written(&self) -> usize {
        self.found + self.not_registered + self.invalid_format + self.lookup_errors
    }
}
